/*
    Copyright (C) 2026  TRACKSTY contributors

    This file is part of TRACKSTY, a Rust library for building emulators.

    TRACKSTY is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    TRACKSTY is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! **TRACKSTY** is a library of register-level emulators of input-device
//! peripherals.
//!
//! Two families of components are provided:
//!
//! * [keyboard] — a keyboard connector joining a mainboard keyboard interface
//!   with a keyboard device over open-collector `CLOCK` and `DATA` lines,
//!   built from the wired-`AND` primitives in [line];
//! * [encoder] — the NEC µPD4701A 2-axis incremental encoder counter,
//!   the interface chip behind many trackball and mouse ports.
//!
//! Every component is a plain, synchronous state machine: events arrive as
//! method calls (a line-level write, a register access, a polling tick) and
//! all resulting state transitions and notifications complete before the
//! call returns. The parties interested in output line changes are selected
//! at assembly time via type parameters implementing the small capability
//! traits each module defines.
//!
//! With the default `snapshot` feature the state of every component can be
//! serialized and restored with [serde](https://serde.rs).
#[macro_use]
extern crate bitflags;

pub mod encoder;
pub mod keyboard;
pub mod line;
