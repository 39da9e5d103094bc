// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod agentic_fetch;
pub mod ask_question;
pub mod bash;
pub mod download;
pub mod edit;
pub mod fetch;
pub mod glob;
pub mod ls;
pub mod multi_edit;
pub mod todo;
pub mod view;
pub mod write;
