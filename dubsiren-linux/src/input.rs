use crate::audio::Cmd;
use color_eyre::{eyre::eyre, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use midly::{live::LiveEvent, MidiMessage};
use std::sync::mpsc::Sender;

/// modwheel
const CC_X: u8 = 1;
/// breath
const CC_Y: u8 = 2;
/// note velocities above this cut off voices already playing the sample
const RETRIGGER_VELOCITY: u8 = 100;

/// Maps controller input onto the sample cloud.
///
/// CC1 and CC2 steer a cursor over the unit square, notes trigger whichever
/// sample sits nearest the cursor, and program changes pick a sample by index.
pub struct InputHandler {
    x: f32,
    y: f32,
    cmd_tx: Sender<Cmd>,
}

impl InputHandler {
    pub fn new(cmd_tx: Sender<Cmd>) -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            cmd_tx,
        }
    }

    pub fn push_midi(&mut self, message: &[u8]) -> Result<()> {
        if let LiveEvent::Midi { message, .. } = LiveEvent::parse(message)? {
            match message {
                MidiMessage::NoteOn { vel, .. } if vel.as_int() > 0 => {
                    self.cmd_tx.send(Cmd::TriggerAt {
                        x: self.x,
                        y: self.y,
                        retrigger: vel.as_int() > RETRIGGER_VELOCITY,
                    })?;
                }
                MidiMessage::Controller { controller, value } => {
                    let value = value.as_int() as f32 / 127.;
                    match controller.as_int() {
                        CC_X => self.x = value,
                        CC_Y => self.y = value,
                        _ => (),
                    }
                }
                MidiMessage::ProgramChange { program } => {
                    self.cmd_tx.send(Cmd::Trigger {
                        index: program.as_int() as usize,
                        retrigger: true,
                    })?;
                }
                _ => (),
            }
        }
        Ok(())
    }
}

/// Listen on the first input port whose name contains `port_name`, or the first port at all.
///
/// Returns `None` when the system has no midi inputs.
pub fn connect(
    port_name: Option<&str>,
    cmd_tx: Sender<Cmd>,
) -> Result<Option<MidiInputConnection<InputHandler>>> {
    let mut midi_in = MidiInput::new("dubsiren")?;
    midi_in.ignore(Ignore::All);

    let ports = midi_in.ports();
    let mut named = Vec::with_capacity(ports.len());
    for port in &ports {
        named.push((midi_in.port_name(port)?, port));
    }
    let Some((name, port)) = named
        .into_iter()
        .find(|(name, _)| port_name.is_none_or(|wanted| name.contains(wanted)))
    else {
        match port_name {
            Some(wanted) => return Err(eyre!("no midi input matching `{wanted}`")),
            None => {
                tracing::warn!("no midi inputs, only the console can trigger samples");
                return Ok(None);
            }
        }
    };
    tracing::info!(port = %name, "listening for midi");

    let connection = midi_in
        .connect(
            port,
            "dubsiren-in",
            |_, message, handler| {
                if let Err(e) = handler.push_midi(message) {
                    tracing::warn!("dropped midi message: {e}");
                }
            },
            InputHandler::new(cmd_tx),
        )
        .map_err(|e| eyre!("failed to connect to {name}: {e}"))?;
    Ok(Some(connection))
}

/// One line of console input.
///
/// `<index>` triggers a sample (`<index>!` retriggers), `<x> <y>` triggers the
/// nearest one, `s` stops every voice and `q` quits.
pub fn parse_line(line: &str) -> Option<Cmd> {
    let mut words = line.split_whitespace();
    let first = words.next()?;
    let cmd = match (first, words.next()) {
        ("q" | "quit", None) => Cmd::Quit,
        ("s" | "stop", None) => Cmd::StopAll,
        (index, None) => match index.strip_suffix('!') {
            Some(index) => Cmd::Trigger {
                index: index.parse().ok()?,
                retrigger: true,
            },
            None => Cmd::Trigger {
                index: index.parse().ok()?,
                retrigger: false,
            },
        },
        (x, Some(y)) => Cmd::TriggerAt {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
            retrigger: false,
        },
    };
    words.next().is_none().then_some(cmd)
}
