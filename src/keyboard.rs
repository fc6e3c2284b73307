/*
    This file is part of TRACKSTY, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A keyboard connector emulator: the open-collector `CLOCK` and `DATA`
//! lines shared between a mainboard keyboard interface and the keyboard.
use core::fmt::Debug;

use log::trace;
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::line::{DriverId, WiredAndLine};

/// One of the two logical signal lines of a [KbdConnector].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KbdLine {
    Clock,
    Data,
}

/// Levels a notified party drives back onto its side of the connector.
///
/// `None` leaves the previously driven level of that line unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineDrive {
    pub clock: Option<bool>,
    pub data: Option<bool>,
}

impl LineDrive {
    /// Drives neither line.
    pub const NONE: LineDrive = LineDrive { clock: None, data: None };

    /// Drives the `CLOCK` line to `level`, leaving `DATA` untouched.
    pub const fn clock(level: bool) -> LineDrive {
        LineDrive { clock: Some(level), data: None }
    }

    /// Drives the `DATA` line to `level`, leaving `CLOCK` untouched.
    pub const fn data(level: bool) -> LineDrive {
        LineDrive { data: Some(level), clock: None }
    }
}

/// The keyboard-side capability of a [KbdConnector].
///
/// Implemented by keyboard devices plugged into the connector at assembly
/// time. The device is notified of every settled line change and responds
/// with the levels it now drives onto its own side of the lines.
pub trait KeyboardPeripheral: Debug {
    /// Called when the settled `CLOCK` line level changed.
    fn clock_write(&mut self, _level: bool) -> LineDrive {
        LineDrive::NONE
    }
    /// Called when the settled `DATA` line level changed.
    fn data_write(&mut self, _level: bool) -> LineDrive {
        LineDrive::NONE
    }
}

/// The mainboard-side notification capability of a [KbdConnector].
///
/// Implemented by the keyboard interface logic of the emulated mainboard.
/// Like the keyboard, it may respond by driving its own side of the lines.
pub trait ConnectorListener: Debug {
    /// Called when the settled `CLOCK` line level changed.
    fn clock_changed(&mut self, _level: bool) -> LineDrive {
        LineDrive::NONE
    }
    /// Called when the settled `DATA` line level changed.
    fn data_changed(&mut self, _level: bool) -> LineDrive {
        LineDrive::NONE
    }
}

/// A keyboard placeholder that never drives the lines.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct NullKeyboard;
impl KeyboardPeripheral for NullKeyboard {}

/// A placeholder [ConnectorListener] discarding all notifications.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct NullConnectorListener;
impl ConnectorListener for NullConnectorListener {}

/// A keyboard connector: two open-collector lines between a mainboard
/// keyboard interface `L` and an optionally attached keyboard `K`.
///
/// Each line settles at the wired-`AND` of the levels driven by both sides
/// (and by any further [driver][DriverId] writing through [write_from]).
/// When a settled level changes, the new level is stored first and then
/// fanned out to the listener and the attached keyboard; the responses they
/// return are driven back onto the lines and propagation repeats until the
/// lines are stable. An echoed level produces no further notification,
/// which is what makes the response loop finite.
///
/// [write_from]: KbdConnector::write_from
#[derive(Clone, Debug)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
#[cfg_attr(feature = "snapshot", serde(bound(deserialize = "
    L: Deserialize<'de> + Default,
    K: Deserialize<'de>",
serialize = "
    L: Serialize,
    K: Serialize")))]
pub struct KbdConnector<L, K> {
    clock: WiredAndLine,
    data: WiredAndLine,
    clock_state: Option<bool>,
    data_state: Option<bool>,
    /// The mainboard-side listener receiving line change notifications.
    #[cfg_attr(feature = "snapshot", serde(default))]
    pub listener: L,
    #[cfg_attr(feature = "snapshot", serde(default))]
    keyboard: Option<K>,
}

impl<L: Default, K> Default for KbdConnector<L, K> {
    fn default() -> Self {
        KbdConnector::new(L::default())
    }
}

impl<L, K> KbdConnector<L, K> {
    /// Creates a connector with nothing attached to its keyboard side.
    pub fn new(listener: L) -> Self {
        KbdConnector {
            clock: Default::default(),
            data: Default::default(),
            clock_state: None,
            data_state: None,
            listener,
            keyboard: None,
        }
    }

    /// Plugs a keyboard into the connector, returning the previous one.
    ///
    /// The new keyboard is not notified of the current line levels.
    pub fn attach_keyboard(&mut self, keyboard: K) -> Option<K> {
        self.keyboard.replace(keyboard)
    }

    /// Unplugs and returns the attached keyboard.
    pub fn detach_keyboard(&mut self) -> Option<K> {
        self.keyboard.take()
    }

    /// Returns a reference to the attached keyboard.
    pub fn keyboard_ref(&self) -> Option<&K> {
        self.keyboard.as_ref()
    }

    /// Returns a mutable reference to the attached keyboard.
    pub fn keyboard_mut(&mut self) -> Option<&mut K> {
        self.keyboard.as_mut()
    }

    /// The last fanned-out `CLOCK` level, `None` before the first write.
    #[inline]
    pub fn clock_state(&self) -> Option<bool> {
        self.clock_state
    }

    /// The last fanned-out `DATA` level, `None` before the first write.
    #[inline]
    pub fn data_state(&self) -> Option<bool> {
        self.data_state
    }

    /// Returns a reference to the underlying wired-`AND` state of a line.
    pub fn line_ref(&self, line: KbdLine) -> &WiredAndLine {
        match line {
            KbdLine::Clock => &self.clock,
            KbdLine::Data => &self.data,
        }
    }
}

impl<L, K> KbdConnector<L, K>
    where L: ConnectorListener,
          K: KeyboardPeripheral
{
    /// Writes the mainboard's `CLOCK` line level.
    pub fn clock_write_from_mb(&mut self, level: bool) {
        self.clock.drive(DriverId::MAINBOARD, level);
        self.update_state(false);
    }

    /// Writes the mainboard's `DATA` line level.
    pub fn data_write_from_mb(&mut self, level: bool) {
        self.data.drive(DriverId::MAINBOARD, level);
        self.update_state(false);
    }

    /// Writes the keyboard's `CLOCK` line level.
    pub fn clock_write_from_kb(&mut self, level: bool) {
        self.clock.drive(DriverId::PERIPHERAL, level);
        self.update_state(true);
    }

    /// Writes the keyboard's `DATA` line level.
    pub fn data_write_from_kb(&mut self, level: bool) {
        self.data.drive(DriverId::PERIPHERAL, level);
        self.update_state(true);
    }

    /// Writes a line level on behalf of an arbitrary [driver][DriverId].
    ///
    /// A driver not seen before joins the line with its first write.
    pub fn write_from(&mut self, driver: DriverId, line: KbdLine, level: bool) {
        match line {
            KbdLine::Clock => self.clock.drive(driver, level),
            KbdLine::Data => self.data.drive(driver, level),
        };
        self.update_state(driver != DriverId::MAINBOARD);
    }

    fn apply_drive(&mut self, driver: DriverId, drive: LineDrive) {
        if let Some(level) = drive.clock {
            self.clock.drive(driver, level);
        }
        if let Some(level) = drive.data {
            self.data.drive(driver, level);
        }
    }

    fn update_clock(&mut self, from_kb: bool) -> bool {
        let level = match self.clock.level() {
            Some(level) if self.clock_state != Some(level) => level,
            _ => return false,
        };
        // the new state is stored before anyone hears of it, so an echoed
        // write back into the line terminates on the next pass
        self.clock_state = Some(level);
        trace!("{} clock: {}", if from_kb { "<-" } else { "->" }, u8::from(level));
        let drive = self.listener.clock_changed(level);
        self.apply_drive(DriverId::MAINBOARD, drive);
        let drive = match self.keyboard.as_mut() {
            Some(keyboard) => keyboard.clock_write(level),
            None => LineDrive::NONE,
        };
        self.apply_drive(DriverId::PERIPHERAL, drive);
        true
    }

    fn update_data(&mut self, from_kb: bool) -> bool {
        let level = match self.data.level() {
            Some(level) if self.data_state != Some(level) => level,
            _ => return false,
        };
        self.data_state = Some(level);
        trace!("{} data:  {}", if from_kb { "<-" } else { "->" }, u8::from(level));
        let drive = self.listener.data_changed(level);
        self.apply_drive(DriverId::MAINBOARD, drive);
        let drive = match self.keyboard.as_mut() {
            Some(keyboard) => keyboard.data_write(level),
            None => LineDrive::NONE,
        };
        self.apply_drive(DriverId::PERIPHERAL, drive);
        true
    }

    fn update_state(&mut self, from_kb: bool) {
        while self.update_clock(from_kb) | self.update_data(from_kb) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct RecordingListener {
        clock: Vec<bool>,
        data: Vec<bool>,
    }

    impl ConnectorListener for RecordingListener {
        fn clock_changed(&mut self, level: bool) -> LineDrive {
            self.clock.push(level);
            LineDrive::NONE
        }
        fn data_changed(&mut self, level: bool) -> LineDrive {
            self.data.push(level);
            LineDrive::NONE
        }
    }

    #[test]
    fn first_write_propagates() {
        let mut conn = KbdConnector::<_, NullKeyboard>::new(RecordingListener::default());
        assert_eq!(conn.clock_state(), None);
        conn.clock_write_from_mb(true);
        assert_eq!(conn.clock_state(), Some(true));
        assert_eq!(conn.listener.clock, vec![true]);
        assert_eq!(conn.data_state(), None);
    }

    #[test]
    fn repeated_level_not_renotified() {
        let mut conn = KbdConnector::<_, NullKeyboard>::new(RecordingListener::default());
        conn.data_write_from_mb(false);
        conn.data_write_from_mb(false);
        conn.data_write_from_kb(false);
        assert_eq!(conn.listener.data, vec![false]);
        conn.data_write_from_kb(true);
        // the mainboard still holds the line low
        assert_eq!(conn.listener.data, vec![false]);
        conn.data_write_from_mb(true);
        assert_eq!(conn.listener.data, vec![false, true]);
        assert_eq!(conn.data_state(), Some(true));
    }

    #[test]
    fn wired_and_keeps_line_low() {
        let mut conn = KbdConnector::<_, NullKeyboard>::new(RecordingListener::default());
        conn.clock_write_from_mb(true);
        conn.clock_write_from_kb(false);
        assert_eq!(conn.clock_state(), Some(false));
        conn.clock_write_from_mb(false);
        conn.clock_write_from_mb(true);
        assert_eq!(conn.clock_state(), Some(false));
        conn.clock_write_from_kb(true);
        assert_eq!(conn.clock_state(), Some(true));
        assert_eq!(conn.listener.clock, vec![true, false, true]);
    }

    #[test]
    fn attach_does_not_notify() {
        #[derive(Default, Debug)]
        struct CountingKeyboard {
            notified: usize,
        }
        impl KeyboardPeripheral for CountingKeyboard {
            fn clock_write(&mut self, _level: bool) -> LineDrive {
                self.notified += 1;
                LineDrive::NONE
            }
        }
        let mut conn = KbdConnector::<NullConnectorListener, _>::default();
        conn.clock_write_from_mb(true);
        conn.attach_keyboard(CountingKeyboard::default());
        assert_eq!(conn.keyboard_ref().map(|kb| kb.notified), Some(0));
        conn.clock_write_from_mb(false);
        assert_eq!(conn.keyboard_ref().map(|kb| kb.notified), Some(1));
        let kb = conn.detach_keyboard();
        assert_eq!(kb.map(|kb| kb.notified), Some(1));
    }

    // a keyboard inhibiting communication: the first time the CLOCK line
    // goes high it pulls it back down and acknowledges on DATA
    #[derive(Default, Debug)]
    struct InhibitingKeyboard {
        inhibited: bool,
    }

    impl KeyboardPeripheral for InhibitingKeyboard {
        fn clock_write(&mut self, level: bool) -> LineDrive {
            if level && !self.inhibited {
                self.inhibited = true;
                LineDrive { clock: Some(false), data: Some(false) }
            }
            else {
                LineDrive::NONE
            }
        }
    }

    #[test]
    fn reentrant_response_settles() {
        let mut conn = KbdConnector::new(RecordingListener::default());
        conn.attach_keyboard(InhibitingKeyboard::default());
        conn.clock_write_from_mb(true);
        // the keyboard's response is propagated within the same write
        assert_eq!(conn.clock_state(), Some(false));
        assert_eq!(conn.data_state(), Some(false));
        assert_eq!(conn.listener.clock, vec![true, false]);
        assert_eq!(conn.listener.data, vec![false]);
        // releasing from the keyboard side frees both lines
        conn.clock_write_from_kb(true);
        conn.data_write_from_kb(true);
        assert_eq!(conn.clock_state(), Some(true));
        assert_eq!(conn.data_state(), Some(true));
    }

    #[test]
    fn third_driver_joins_the_bus() {
        let mut conn = KbdConnector::<_, NullKeyboard>::new(RecordingListener::default());
        conn.clock_write_from_mb(true);
        conn.clock_write_from_kb(true);
        let splitter = DriverId::new(2);
        conn.write_from(splitter, KbdLine::Clock, false);
        assert_eq!(conn.clock_state(), Some(false));
        conn.write_from(splitter, KbdLine::Clock, true);
        assert_eq!(conn.clock_state(), Some(true));
        assert_eq!(conn.listener.clock, vec![true, false, true]);
    }

    #[cfg(feature = "snapshot")]
    #[test]
    fn snapshot_roundtrip() {
        let mut conn: KbdConnector<NullConnectorListener, NullKeyboard> = Default::default();
        conn.clock_write_from_mb(true);
        conn.data_write_from_kb(false);
        conn.attach_keyboard(NullKeyboard);
        let json = serde_json::to_string(&conn).unwrap();
        let restored: KbdConnector<NullConnectorListener, NullKeyboard> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(restored.clock_state(), Some(true));
        assert_eq!(restored.data_state(), Some(false));
        assert_eq!(restored.line_ref(KbdLine::Data), conn.line_ref(KbdLine::Data));
        assert!(restored.keyboard_ref().is_some());
    }
}
