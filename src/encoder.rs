/*
    This file is part of TRACKSTY, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Incremental encoder counter interfaces and chip emulators.
use core::fmt::Debug;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

pub mod upd4701;

bitflags! {
    /// Flags of the encoder's three switch inputs.
    /// * Bit = 1 a switch is closed.
    /// * Bit = 0 a switch is open.
    ///
    /// The switch input lines themselves are active low; closing a switch
    /// pulls its line low and sets its flag here.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default)]
    pub struct EncoderSwitches: u8 {
        const MIDDLE = 0b0001;
        const RIGHT  = 0b0010;
        const LEFT   = 0b0100;
        /// Set in the latched copy of the switch state when any switch
        /// was closed at latch time.
        const ANY    = 0b1000;
    }
}

bitflags! {
    /// Raw levels of the encoder's control input lines.
    ///
    /// Useful for snapshotting the line state as a group; individual line
    /// writes go through the chip's edge-sensitive setters.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default)]
    pub struct ControlLines: u8 {
        const CS      = 0b00001;
        const XY      = 0b00010;
        const UL      = 0b00100;
        const RESET_X = 0b01000;
        const RESET_Y = 0b10000;
    }
}

/// Receives level changes of an encoder chip's status output lines.
///
/// Both flag outputs are active low: a `false` level means the flag is
/// asserted. Selected at assembly time as the chip's `L` type parameter.
pub trait FlagListener: Debug {
    /// Called when the CF (counter flag) output changes level.
    fn cf_changed(&mut self, _level: bool) {}
    /// Called when the SF (switch flag) output changes level.
    fn sf_changed(&mut self, _level: bool) {}
    /// Returns the value floating on the data bus while the chip drives
    /// nothing onto it.
    fn open_bus(&mut self) -> u8 {
        0
    }
}

/// A placeholder [FlagListener] ignoring the flag outputs.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct NullFlagListener;
impl FlagListener for NullFlagListener {}

/// An absolute position input sampled by an encoder chip's polling tick.
///
/// Readings are taken modulo 4096; the difference between two consecutive
/// readings, wrapped at the 12-bit boundary, is the counted movement.
pub trait AxisPort: Debug {
    /// Returns the current absolute reading.
    fn read(&mut self) -> u16;
}

/// An axis input placeholder for unattached ports.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct NullAxisPort;
impl AxisPort for NullAxisPort {
    fn read(&mut self) -> u16 {
        0
    }
}

impl From<u8> for EncoderSwitches {
    fn from(switches: u8) -> Self {
        EncoderSwitches::from_bits_truncate(switches)
    }
}

impl From<EncoderSwitches> for u8 {
    fn from(switches: EncoderSwitches) -> Self {
        switches.bits()
    }
}

impl From<u8> for ControlLines {
    fn from(lines: u8) -> Self {
        ControlLines::from_bits_truncate(lines)
    }
}

impl From<ControlLines> for u8 {
    fn from(lines: ControlLines) -> Self {
        lines.bits()
    }
}
