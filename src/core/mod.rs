// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Types shared by the parser, validator and lowering pass.

pub mod diagnostics;
pub mod instruction;
pub mod needle;
