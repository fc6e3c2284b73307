/*
    This file is part of TRACKSTY, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The NEC µPD4701A 2-axis incremental encoder counter.
use log::warn;
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::line::replace_level;
use super::{AxisPort, ControlLines, EncoderSwitches, FlagListener,
            NullAxisPort, NullFlagListener};

const MASK_COUNTER: u16 = 0xfff;

/// The µPD4701A incremental encoder counter chip.
///
/// The chip accumulates movement of two axes into free-running counters
/// and snapshots them, relative to their last reset, into a pair of 12-bit
/// latches whenever the `CS` line falls. Register reads return the latches
/// one byte at a time, multiplexed by the `X/Y` axis select and `U/L` byte
/// select lines, with the latched state of the three switch inputs in the
/// top nibble. Two status outputs report activity between reads:
///
/// * `CF` (counter flag, active low) is asserted by the first counted
///   movement while the chip is deselected and forced back inactive for as
///   long as `CS` stays low;
/// * `SF` (switch flag, active low) follows the switch group: asserted
///   when the first switch closes, released when the last one opens.
///
/// Level changes of both outputs are delivered to the [FlagListener] `L`.
/// Optional absolute input sources `X` and `Y` can be attached for
/// per-tick polling with [update][Upd4701::update].
///
/// Counters are relative-encoder state: they keep accumulating across
/// reads until a reset pulse rebases them.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
#[cfg_attr(feature = "snapshot", serde(bound(deserialize = "
    L: Deserialize<'de> + Default",
serialize = "
    L: Serialize")))]
pub struct Upd4701<L=NullFlagListener, X=NullAxisPort, Y=NullAxisPort> {
    cs: bool,
    xy: bool,
    ul: bool,
    resetx: bool,
    resety: bool,
    latchx: u16,
    latchy: u16,
    startx: i32,
    starty: i32,
    x: i32,
    y: i32,
    last_x_read: u16,
    last_y_read: u16,
    switches: EncoderSwitches,
    latch_switches: EncoderSwitches,
    cf: bool,
    /// The listener receiving CF and SF output changes.
    #[cfg_attr(feature = "snapshot", serde(default))]
    pub listener: L,
    #[cfg_attr(feature = "snapshot", serde(skip))]
    portx: Option<X>,
    #[cfg_attr(feature = "snapshot", serde(skip))]
    porty: Option<Y>,
}

impl<L: Default, X, Y> Default for Upd4701<L, X, Y> {
    fn default() -> Self {
        Upd4701::new(L::default())
    }
}

impl<L, X, Y> Upd4701<L, X, Y> {
    /// Creates a chip with all lines released and counters cleared.
    pub fn new(listener: L) -> Self {
        Upd4701 {
            cs: true,
            xy: false,
            ul: false,
            resetx: false,
            resety: false,
            latchx: 0,
            latchy: 0,
            startx: 0,
            starty: 0,
            x: 0,
            y: 0,
            last_x_read: 0,
            last_y_read: 0,
            switches: EncoderSwitches::empty(),
            latch_switches: EncoderSwitches::empty(),
            cf: true,
            listener,
            portx: None,
            porty: None,
        }
    }

    /// Attaches an absolute input source to the X axis, returning the
    /// previous one.
    ///
    /// Follow up with [recalibrate][Upd4701::recalibrate] if the chip was
    /// already in use, so the source switch is not counted as movement.
    pub fn attach_port_x(&mut self, port: X) -> Option<X> {
        self.portx.replace(port)
    }

    /// Attaches an absolute input source to the Y axis, returning the
    /// previous one.
    pub fn attach_port_y(&mut self, port: Y) -> Option<Y> {
        self.porty.replace(port)
    }

    /// Detaches and returns the X axis input source.
    pub fn detach_port_x(&mut self) -> Option<X> {
        self.portx.take()
    }

    /// Detaches and returns the Y axis input source.
    pub fn detach_port_y(&mut self) -> Option<Y> {
        self.porty.take()
    }

    /// Returns the raw free-running counters.
    pub fn counts(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Overwrites the raw free-running counters.
    pub fn set_counts(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    /// Returns the baselines captured by the last reset pulses.
    pub fn baselines(&self) -> (i32, i32) {
        (self.startx, self.starty)
    }

    /// Overwrites the reset baselines.
    pub fn set_baselines(&mut self, startx: i32, starty: i32) {
        self.startx = startx;
        self.starty = starty;
    }

    /// Returns the latched 12-bit counter snapshots.
    pub fn latches(&self) -> (u16, u16) {
        (self.latchx, self.latchy)
    }

    /// Overwrites the latched counter snapshots.
    pub fn set_latches(&mut self, latchx: u16, latchy: u16) {
        self.latchx = latchx & MASK_COUNTER;
        self.latchy = latchy & MASK_COUNTER;
    }

    /// Returns the live switch state.
    pub fn switches(&self) -> EncoderSwitches {
        self.switches
    }

    /// Overwrites the live switch state.
    pub fn set_switches(&mut self, switches: EncoderSwitches) {
        self.switches = switches - EncoderSwitches::ANY;
    }

    /// Returns the switch state captured by the last latch.
    pub fn latched_switches(&self) -> EncoderSwitches {
        self.latch_switches
    }

    /// Overwrites the latched switch state.
    pub fn set_latched_switches(&mut self, switches: EncoderSwitches) {
        self.latch_switches = switches;
    }

    /// Returns the last readings taken from the axis input sources.
    pub fn last_reads(&self) -> (u16, u16) {
        (self.last_x_read, self.last_y_read)
    }

    /// Overwrites the last axis input readings.
    pub fn set_last_reads(&mut self, x: u16, y: u16) {
        self.last_x_read = x & MASK_COUNTER;
        self.last_y_read = y & MASK_COUNTER;
    }

    /// Returns the raw levels of all control input lines.
    pub fn control_lines(&self) -> ControlLines {
        let mut lines = ControlLines::empty();
        lines.set(ControlLines::CS, self.cs);
        lines.set(ControlLines::XY, self.xy);
        lines.set(ControlLines::UL, self.ul);
        lines.set(ControlLines::RESET_X, self.resetx);
        lines.set(ControlLines::RESET_Y, self.resety);
        lines
    }

    /// Overwrites the raw levels of all control input lines.
    ///
    /// No edge actions fire; this restores line state verbatim.
    pub fn set_control_lines(&mut self, lines: ControlLines) {
        self.cs = lines.intersects(ControlLines::CS);
        self.xy = lines.intersects(ControlLines::XY);
        self.ul = lines.intersects(ControlLines::UL);
        self.resetx = lines.intersects(ControlLines::RESET_X);
        self.resety = lines.intersects(ControlLines::RESET_Y);
    }

    /// Overwrites the CF output level.
    pub fn set_counter_flag(&mut self, level: bool) {
        self.cf = level;
    }

    /// Reads the CF (counter flag) output level: low after a movement was
    /// counted while the chip was deselected.
    #[inline]
    pub fn cf_r(&self) -> bool {
        self.cf
    }

    /// Reads the SF (switch flag) output level: low while any switch is
    /// closed.
    #[inline]
    pub fn sf_r(&self) -> bool {
        self.switches.is_empty()
    }
}

impl<L, X, Y> Upd4701<L, X, Y>
    where L: FlagListener,
          X: AxisPort,
          Y: AxisPort
{
    /// Writes to the CS (chip select, active low) line.
    ///
    /// The falling edge latches both counters relative to their baselines,
    /// latches the switch state with the any-switch summary bit, and forces
    /// the CF output inactive. CF remains inactive for as long as CS stays
    /// low.
    pub fn cs_w(&mut self, level: bool) {
        if replace_level(&mut self.cs, level) && !self.cs {
            self.latchx = self.x.wrapping_sub(self.startx) as u16 & MASK_COUNTER;
            self.latchy = self.y.wrapping_sub(self.starty) as u16 & MASK_COUNTER;

            self.latch_switches = self.switches;
            if !self.switches.is_empty() {
                self.latch_switches |= EncoderSwitches::ANY;
            }

            if !self.cf {
                self.cf = true;
                self.listener.cf_changed(true);
            }
        }
    }

    /// Writes to the X/Y axis select line: high selects the Y counter.
    pub fn xy_w(&mut self, level: bool) {
        self.xy = level;
    }

    /// Writes to the U/L byte select line: high selects the upper byte.
    pub fn ul_w(&mut self, level: bool) {
        self.ul = level;
    }

    /// Writes to the X counter reset line.
    ///
    /// The rising edge rebases the counter: subsequent latches report the
    /// movement counted from this instant.
    pub fn resetx_w(&mut self, level: bool) {
        if replace_level(&mut self.resetx, level) && self.resetx {
            self.startx = self.x;
        }
    }

    /// Writes to the Y counter reset line.
    pub fn resety_w(&mut self, level: bool) {
        if replace_level(&mut self.resety, level) && self.resety {
            self.starty = self.y;
        }
    }

    /// Pulses the X counter reset line, as a register read.
    ///
    /// Returns the open bus value supplied by the listener.
    pub fn reset_x_r(&mut self) -> u8 {
        self.resetx_w(true);
        self.resetx_w(false);
        self.listener.open_bus()
    }

    /// Pulses the X counter reset line, as a register write.
    pub fn reset_x_w(&mut self, _data: u8) {
        self.resetx_w(true);
        self.resetx_w(false);
    }

    /// Pulses the Y counter reset line, as a register read.
    pub fn reset_y_r(&mut self) -> u8 {
        self.resety_w(true);
        self.resety_w(false);
        self.listener.open_bus()
    }

    /// Pulses the Y counter reset line, as a register write.
    pub fn reset_y_w(&mut self, _data: u8) {
        self.resety_w(true);
        self.resety_w(false);
    }

    /// Pulses both counter reset lines, as a register read.
    pub fn reset_xy_r(&mut self) -> u8 {
        self.resetx_w(true);
        self.resety_w(true);
        self.resetx_w(false);
        self.resety_w(false);
        self.listener.open_bus()
    }

    /// Pulses both counter reset lines, as a register write.
    pub fn reset_xy_w(&mut self, _data: u8) {
        self.resetx_w(true);
        self.resety_w(true);
        self.resetx_w(false);
        self.resety_w(false);
    }

    /// Counts a relative X axis movement.
    ///
    /// Ignored while the X reset line is held or when `delta` is zero.
    /// The first movement counted while the chip is deselected asserts the
    /// CF output.
    pub fn x_add(&mut self, delta: i16) {
        if !self.resetx && delta != 0 {
            self.x = self.x.wrapping_add(delta.into());

            if self.cs && self.cf {
                self.cf = false;
                self.listener.cf_changed(false);
            }
        }
    }

    /// Counts a relative Y axis movement.
    pub fn y_add(&mut self, delta: i16) {
        if !self.resety && delta != 0 {
            self.y = self.y.wrapping_add(delta.into());

            if self.cs && self.cf {
                self.cf = false;
                self.listener.cf_changed(false);
            }
        }
    }

    /// Updates the state of one or more switch input lines (active low).
    ///
    /// The SF output is asserted when the group goes from all-open to the
    /// first closed switch and released when the last closed switch opens;
    /// switch changes in between produce no SF notification.
    pub fn switch_update(&mut self, mask: EncoderSwitches, level: bool) {
        if !level && !self.switches.intersects(mask) {
            // switch closed
            self.switches.insert(mask);

            if (self.switches - mask).is_empty() {
                self.listener.sf_changed(false);
            }
        }
        else if level && self.switches.contains(mask) {
            // switch opened
            self.switches.remove(mask);

            if (self.switches - mask).is_empty() {
                self.listener.sf_changed(true);
            }
        }
    }

    /// Writes to the left switch input line (active low).
    pub fn left_w(&mut self, level: bool) {
        self.switch_update(EncoderSwitches::LEFT, level);
    }

    /// Writes to the right switch input line (active low).
    pub fn right_w(&mut self, level: bool) {
        self.switch_update(EncoderSwitches::RIGHT, level);
    }

    /// Writes to the middle switch input line (active low).
    pub fn middle_w(&mut self, level: bool) {
        self.switch_update(EncoderSwitches::MIDDLE, level);
    }

    /// Reads the multiplexed data output lines.
    ///
    /// Returns one byte of the latched counter selected by the `X/Y` line,
    /// with the latched switch state in bits 12 to 15 and the `U/L` line
    /// choosing between the upper and lower byte. While the chip is
    /// deselected the data outputs float and the open bus value is
    /// returned instead.
    pub fn d_r(&mut self) -> u8 {
        if self.cs {
            warn!("upd4701: read while CS inactive");
            return self.listener.open_bus()
        }

        let mut data = if self.xy { self.latchy } else { self.latchx };
        data |= u16::from(self.latch_switches.bits()) << 12;

        if self.ul {
            (data >> 8) as u8
        }
        else {
            data as u8
        }
    }

    /// Reads a byte of the X axis through the data/address bus.
    ///
    /// `offset` bit 0 selects the upper byte.
    pub fn read_x(&mut self, offset: u8) -> u8 {
        self.read_xy(offset & 1)
    }

    /// Reads a byte of the Y axis through the data/address bus.
    pub fn read_y(&mut self, offset: u8) -> u8 {
        self.read_xy((offset & 1) | 2)
    }

    /// Reads one of the four data registers:
    /// `0`: X low, `1`: X high, `2`: Y low, `3`: Y high.
    pub fn read(&mut self, offset: u8) -> u8 {
        self.read_xy(offset & 3)
    }

    /// Writes one of the reset registers: `0` pulses the X reset line,
    /// `1` pulses Y, anything else pulses both.
    pub fn write(&mut self, offset: u8, data: u8) {
        match offset & 3 {
            0 => self.reset_x_w(data),
            1 => self.reset_y_w(data),
            _ => self.reset_xy_w(data),
        }
    }

    // selects the chip and drives the multiplexing lines programmatically,
    // with the same latch side effect a real CS edge has
    fn read_xy(&mut self, offset: u8) -> u8 {
        let old_cs = self.cs;
        self.cs_w(false);
        self.xy_w(offset & 2 != 0);
        self.ul_w(offset & 1 != 0);
        let result = self.d_r();
        self.cs_w(old_cs);
        result
    }

    /// Samples the attached axis input sources and counts the movement
    /// since the previous sample.
    ///
    /// To be driven at a fixed rate by the host, e.g. once per emulated
    /// frame.
    pub fn update(&mut self) {
        if let Some(port) = self.portx.as_mut() {
            let x = port.read() & MASK_COUNTER;
            self.x_add(axis_delta(x, self.last_x_read));
            self.last_x_read = x;
        }
        if let Some(port) = self.porty.as_mut() {
            let y = port.read() & MASK_COUNTER;
            self.y_add(axis_delta(y, self.last_y_read));
            self.last_y_read = y;
        }
    }

    /// Refreshes the stored axis readings without counting any movement.
    ///
    /// To be used when the identity of an input source changes under the
    /// chip, so the next [update][Upd4701::update] does not see the switch
    /// as a jump.
    pub fn recalibrate(&mut self) {
        if let Some(port) = self.portx.as_mut() {
            self.last_x_read = port.read() & MASK_COUNTER;
        }
        if let Some(port) = self.porty.as_mut() {
            self.last_y_read = port.read() & MASK_COUNTER;
        }
    }
}

// readings advance modulo 4096, so a wrap at the boundary counts as the
// small movement across it, not as a 4k jump back
fn axis_delta(current: u16, previous: u16) -> i16 {
    let diff = current.wrapping_sub(previous) & MASK_COUNTER;
    if diff > MASK_COUNTER / 2 {
        diff as i16 - (MASK_COUNTER as i16 + 1)
    }
    else {
        diff as i16
    }
}
