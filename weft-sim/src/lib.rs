// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The WEFT launcher library: settings document handling and the
//! build-connect-run sequence the `weft-sim` binary drives.

pub mod builder;
pub mod settings;
