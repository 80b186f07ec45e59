//! End-to-end command sequencing against a scripted transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use alienfx::command::{Command, PowerState, ResetKind, Rgb};
use alienfx::controller::{Controller, READY_POLL_LIMIT};
use alienfx::packet::Generation;
use alienfx::theme::{Effect, ThemeFile};
use alienfx::transport::Transport;
use alienfx::zone::Zone;
use alienfx::{Error, Result};

#[derive(Default)]
struct State {
    acquired: bool,
    acquires: u32,
    releases: u32,
    written: Vec<Vec<u8>>,
    /// Scripted read responses; an exhausted queue answers ready.
    replies: VecDeque<Vec<u8>>,
}

/// Transport recording all traffic into shared state.
#[derive(Default)]
struct RecordingTransport {
    state: Rc<RefCell<State>>,
}

impl RecordingTransport {
    fn busy_for(polls: usize) -> RecordingTransport {
        let replies = (0..polls).map(|_| vec![0x11, 0, 0]).collect();
        let state = State { replies, ..Default::default() };
        RecordingTransport { state: Rc::new(RefCell::new(state)) }
    }
}

impl Transport for RecordingTransport {
    fn acquire(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.acquired {
            state.acquired = true;
            state.acquires += 1;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.acquired {
            state.acquired = false;
            state.releases += 1;
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: &[u8]) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        assert!(state.acquired, "write without acquire");
        state.written.push(packet.to_vec());
        Ok(packet.len())
    }

    fn read_packet(&mut self) -> Result<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        assert!(state.acquired, "read without acquire");
        Ok(state.replies.pop_front().unwrap_or_else(|| vec![0x10, 0, 0]))
    }
}

fn encode_all(generation: Generation, commands: &[Command]) -> Vec<Vec<u8>> {
    commands
        .iter()
        .map(|command| generation.encode(command).unwrap().to_vec())
        .collect()
}

#[test]
fn theme_application_transmits_the_documented_sequence() {
    let theme: ThemeFile = serde_json::from_str(
        r#"{
            "TEMPO": 100,
            "ZONES": {
                "ALIEN_HEAD": [{ "EFFECT": "SET_COLOR", "COLOR": [255, 0, 0] }]
            }
        }"#,
    )
    .unwrap();
    let compiled = theme.compile().unwrap();

    let transport = RecordingTransport::default();
    let state = transport.state.clone();
    let mut controller = Controller::new(transport, Generation::MODERN);
    controller.apply(&compiled).unwrap();

    let expected = encode_all(
        Generation::MODERN,
        &[
            Command::Reset(ResetKind::AllLightsOn),
            Command::GetStatus,
            Command::SetTempo(100),
            Command::SetColor {
                sequence: 0,
                zones: Zone::AlienHead.into(),
                color: Rgb::new(255, 0, 0),
            },
            Command::LoopSequence,
            Command::Execute,
            Command::GetStatus,
        ],
    );

    let state = state.borrow();
    assert_eq!(state.written, expected);
    assert_eq!(state.acquires, 1);
    assert_eq!(state.releases, 1);
    assert!(!state.acquired);
}

#[test]
fn master_set_transmits_the_documented_sequence() {
    let transport = RecordingTransport::default();
    let state = transport.state.clone();
    let mut controller = Controller::new(transport, Generation::MODERN);

    controller
        .set_zones(
            Zone::TouchPad.into(),
            Effect::Morph(Rgb::new(0, 255, 0), Rgb::new(0, 0, 255)),
            300,
            None,
        )
        .unwrap();

    let expected = encode_all(
        Generation::MODERN,
        &[
            Command::Reset(ResetKind::AllLightsOn),
            Command::GetStatus,
            Command::SetTempo(300),
            Command::MorphColor {
                sequence: 1,
                zones: Zone::TouchPad.into(),
                start: Rgb::new(0, 255, 0),
                end: Rgb::new(0, 0, 255),
            },
            Command::LoopSequence,
            Command::Execute,
            Command::GetStatus,
        ],
    );

    assert_eq!(state.borrow().written, expected);
}

#[test]
fn saved_effects_are_bracketed() {
    let transport = RecordingTransport::default();
    let state = transport.state.clone();
    let mut controller = Controller::new(transport, Generation::MODERN);

    controller
        .set_zones(
            Zone::PowerButton.into(),
            Effect::Blink(Rgb::new(255, 0, 0)),
            200,
            Some(PowerState::BatteryCritical),
        )
        .unwrap();

    let expected = encode_all(
        Generation::MODERN,
        &[
            Command::Reset(ResetKind::AllLightsOn),
            Command::GetStatus,
            Command::SaveNext(PowerState::BatteryCritical),
            Command::SetTempo(200),
            Command::BlinkColor {
                sequence: 1,
                zones: Zone::PowerButton.into(),
                color: Rgb::new(255, 0, 0),
            },
            Command::LoopSequence,
            Command::Save,
            Command::Execute,
            Command::GetStatus,
        ],
    );

    assert_eq!(state.borrow().written, expected);
}

#[test]
fn busy_controller_fails_after_the_poll_ceiling() {
    let theme: ThemeFile = serde_json::from_str(
        r#"{ "ZONES": { "TOUCH_PAD": [{ "EFFECT": "SET_COLOR", "COLOR": [0, 0, 255] }] } }"#,
    )
    .unwrap();
    let compiled = theme.compile().unwrap();

    let transport = RecordingTransport::busy_for(200);
    let state = transport.state.clone();
    let mut controller = Controller::new(transport, Generation::MODERN);

    let err = controller.apply(&compiled).unwrap_err();
    assert!(matches!(err, Error::ControllerUnreachable { attempts: READY_POLL_LIMIT }));
    assert!(err.is_fatal());

    let state = state.borrow();
    // One reset, then exactly the poll ceiling of status requests.
    assert_eq!(state.written.len(), 1 + READY_POLL_LIMIT as usize);
    assert!(state.written[1..].iter().all(|packet| packet[1] == 0x06));
    // The device is still released on the failure path.
    assert_eq!(state.releases, 1);
    assert!(!state.acquired);
}

#[test]
fn legacy_controllers_get_short_packets() {
    let transport = RecordingTransport::default();
    let state = transport.state.clone();
    let mut controller = Controller::new(transport, Generation::LEGACY);

    controller
        .set_zones(Zone::AlienHead.into(), Effect::Set(Rgb::new(255, 255, 255)), 200, None)
        .unwrap();

    let state = state.borrow();
    assert!(!state.written.is_empty());
    for packet in &state.written {
        assert_eq!(packet.len(), Generation::LEGACY.packet_len());
        assert_eq!(packet[0], 0x02);
    }
}

#[test]
fn every_operation_releases_the_device() {
    let transport = RecordingTransport::default();
    let state = transport.state.clone();
    let mut controller = Controller::new(transport, Generation::MODERN);

    controller.all_lights_on().unwrap();
    controller.all_lights_off().unwrap();
    controller.status().unwrap();

    let state = state.borrow();
    assert_eq!(state.acquires, 3);
    assert_eq!(state.releases, 3);
    assert!(!state.acquired);
}

#[test]
fn invalid_themes_never_touch_the_device() {
    let theme: ThemeFile = serde_json::from_str(
        r#"{
            "TEMPO": 10,
            "ZONES": {
                "ALIEN_HEAD": [{ "EFFECT": "SET_COLOR", "COLOR": [255, 0, 0] }]
            }
        }"#,
    )
    .unwrap();
    assert!(matches!(theme.compile(), Err(Error::InvalidTempo(10))));

    // Compilation already failed, but even a hand-built command list with an
    // invalid tempo must fail during encoding, before the device is acquired.
    let compiled = alienfx::theme::CompiledTheme {
        description: String::new(),
        tempo: 10,
        duration: 10_000,
        commands: vec![
            Command::SetTempo(10),
            Command::SetColor {
                sequence: 0,
                zones: Zone::AlienHead.into(),
                color: Rgb::new(255, 0, 0),
            },
            Command::LoopSequence,
        ],
    };

    let transport = RecordingTransport::default();
    let state = transport.state.clone();
    let mut controller = Controller::new(transport, Generation::MODERN);

    assert!(controller.apply(&compiled).is_err());

    let state = state.borrow();
    assert_eq!(state.acquires, 0);
    assert!(state.written.is_empty());
}
