// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Library entry exposing the formal knitout checker and knitout lowering.
pub mod cli;
pub mod core;
pub mod formal;
pub mod lower;
