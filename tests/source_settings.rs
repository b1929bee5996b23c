//! Source settings window against a simulated BLDS.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use blds_client::{
    AddressSource, BldsClient, Connector, ParamValue, ServerAddress, SimConfig, SimulatedServer,
    SourceParam, SourceType, Trigger,
};
use meactl::session::{Notification, Severity};
use meactl::source_settings::{AnalogOutputState, PanelState, SourceSettingsPanel};
use tokio::runtime::Runtime;

struct Harness {
    server: SimulatedServer,
    runtime: Runtime,
}

impl Harness {
    fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let server = SimulatedServer::with_config(SimConfig {
            hosts: vec!["localhost".into()],
            latency: Duration::ZERO,
        });
        Self { server, runtime }
    }

    fn with_source(source_type: SourceType, location: &str) -> (Self, Arc<dyn BldsClient>) {
        let h = Self::new();
        let client = h.client();
        h.runtime
            .block_on(client.create_source(source_type, location))
            .unwrap();
        (h, client)
    }

    fn client(&self) -> Arc<dyn BldsClient> {
        self.runtime
            .block_on(self.server.connector().connect(&address("localhost")))
            .unwrap()
    }

    fn open(&self, host: &str) -> SourceSettingsPanel {
        let mut panel = SourceSettingsPanel::open(
            self.runtime.handle().clone(),
            Arc::new(self.server.connector()),
            address(host),
        );
        settle(&mut panel);
        panel
    }
}

fn address(host: &str) -> ServerAddress {
    ServerAddress::parse(host, AddressSource::UserInput).unwrap()
}

fn settle(panel: &mut SourceSettingsPanel) {
    wait_until(panel, |p| !p.is_busy());
}

fn wait_until(panel: &mut SourceSettingsPanel, done: impl Fn(&SourceSettingsPanel) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        panel.update();
        if done(panel) {
            return;
        }
        assert!(Instant::now() < deadline, "panel did not settle");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn no_source_closes_with_critical_dialog() {
    let h = Harness::new();
    let mut panel = h.open("localhost");

    assert_eq!(panel.state(), PanelState::Closed);
    assert!(!panel.is_open());
    let dialogs = panel.take_dialogs();
    assert_eq!(dialogs.len(), 1);
    assert_eq!(dialogs[0].title, "No source!");
    assert_eq!(dialogs[0].severity, Severity::Critical);
}

#[test]
fn unreachable_server_closes_with_warning() {
    let h = Harness::new();
    let mut panel = h.open("nowhere.invalid");
    assert!(!panel.is_open());
    assert_eq!(panel.take_dialogs()[0].title, "Could not connect");
}

#[test]
fn file_source_loads_and_locks_hidens_params() {
    let (h, _client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let panel = h.open("localhost");

    assert_eq!(panel.state(), PanelState::Ready);
    assert_eq!(panel.source_type(), Some(SourceType::File));
    assert!(panel.can_edit(SourceParam::AdcRange));
    assert!(panel.can_edit(SourceParam::Trigger));
    assert!(!panel.can_edit(SourceParam::Plug));
    assert!(!panel.can_edit(SourceParam::ConfigurationFile));
    assert_eq!(panel.params().analog_output, AnalogOutputState::None);
}

#[test]
fn adc_range_and_trigger_are_applied() {
    let (h, client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let mut panel = h.open("localhost");

    panel.set_adc_range(2.0);
    assert_eq!(panel.params().adc_range, 2.0);
    assert!(!panel.can_edit(SourceParam::AdcRange));
    panel.set_trigger(Trigger::Photodiode);
    settle(&mut panel);

    let notifications = panel.take_notifications();
    assert!(notifications.contains(&Notification::AdcRangeChanged(2.0)));
    assert!(notifications.contains(&Notification::TriggerSet(Trigger::Photodiode)));
    let value = h
        .runtime
        .block_on(client.get_source(SourceParam::AdcRange))
        .unwrap();
    assert_eq!(value.as_f64().unwrap(), 2.0);
}

#[test]
fn out_of_range_adc_is_refused_locally() {
    let (h, _client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let mut panel = h.open("localhost");
    let before = panel.params().adc_range;

    panel.set_adc_range(50.0);
    assert!(!panel.is_busy());
    assert_eq!(panel.params().adc_range, before);
    assert_eq!(panel.take_dialogs()[0].title, "Invalid ADC range");
}

#[test]
fn hidens_plug_and_configuration() {
    let (h, _client) = Harness::with_source(SourceType::Hidens, "rig-1");
    let mut panel = h.open("localhost");
    assert!(panel.can_edit(SourceParam::Plug));

    panel.set_plug(3);
    panel.set_configuration_file("/tmp/chip.cmdraw");
    settle(&mut panel);

    assert_eq!(panel.params().plug, Some(3));
    let notifications = panel.take_notifications();
    assert!(notifications.contains(&Notification::PlugSet(3)));
    assert!(notifications.contains(&Notification::ConfigurationRead("/tmp/chip.cmdraw".into())));
}

#[test]
fn rejected_clear_restores_analog_output() {
    let (h, client) = Harness::with_source(SourceType::Mcs, "");
    h.runtime.block_on(async {
        client
            .set_source(SourceParam::AnalogOutput, ParamValue::Samples(vec![0.0, 1.0]))
            .await
            .unwrap();
        client.start_recording().await.unwrap();
    });

    let mut panel = h.open("localhost");
    assert_eq!(panel.params().analog_output, AnalogOutputState::Unknown);

    panel.clear_analog_output();
    assert_eq!(panel.params().analog_output, AnalogOutputState::None);
    settle(&mut panel);

    assert_eq!(panel.params().analog_output, AnalogOutputState::Unknown);
    let dialogs = panel.take_dialogs();
    assert_eq!(dialogs[0].severity, Severity::Warning);
    assert!(dialogs[0].message.contains("recording"));
    assert!(panel.is_open());
}

#[test]
fn bad_analog_output_file_leaves_waveform_alone() {
    let (h, _client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let mut panel = h.open("localhost");

    let mut file = tempfile::Builder::new().suffix(".h5").tempfile().unwrap();
    writeln!(file, "not an hdf5 file").unwrap();
    panel.load_analog_output(file.path().to_path_buf());
    assert!(panel.is_busy());
    settle(&mut panel);

    assert_eq!(panel.params().analog_output, AnalogOutputState::None);
    assert_eq!(panel.take_dialogs()[0].title, "Invalid analog output file");
    assert!(panel.take_notifications().is_empty());
}

#[test]
fn server_failure_closes_panel() {
    let (h, _client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let mut panel = h.open("localhost");

    h.runtime.block_on(h.server.shutdown("server halted"));
    wait_until(&mut panel, |p| !p.is_open());
    let dialogs = panel.take_dialogs();
    assert_eq!(dialogs[0].severity, Severity::Critical);
}

#[test]
fn close_is_idempotent() {
    let (h, _client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let mut panel = h.open("localhost");
    panel.close();
    panel.close();
    assert_eq!(panel.state(), PanelState::Closed);
    assert!(!panel.can_edit(SourceParam::AdcRange));
}

#[test]
fn reopening_the_panel_leaves_no_tasks_behind() {
    let (h, _client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let metrics = h.runtime.handle().metrics();
    let baseline = metrics.num_alive_tasks();

    for _ in 0..20 {
        let mut panel = h.open("localhost");
        assert_eq!(panel.state(), PanelState::Ready);
        panel.close();
    }

    // Disconnects run on the runtime after close returns.
    let deadline = Instant::now() + Duration::from_secs(5);
    while metrics.num_alive_tasks() > baseline {
        assert!(
            Instant::now() < deadline,
            "{} tasks still alive, expected {}",
            metrics.num_alive_tasks(),
            baseline
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn analog_output_loading_follows_hdf5_support() {
    let (h, _client) = Harness::with_source(SourceType::File, "/tmp/x.h5");
    let mut panel = h.open("localhost");
    assert!(panel.can_edit(SourceParam::AnalogOutput));
    assert_eq!(panel.can_load_analog_output(), cfg!(feature = "hdf5"));

    panel.close();
    assert!(!panel.can_load_analog_output());
}
