// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub type AppResult<T> = Result<T, AppError>;

/// Error taxonomy of the networking core.
///
/// Transport errors stay local to one connection: they are logged and
/// trigger that connection's disconnect, never a process exit. Only
/// resolution and connect failures surface synchronously to callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// address or name lookup failed; reported to the `connect` caller
    #[error("address resolution failed: {0}")]
    Resolution(String),

    /// transport-level connect failure; reported to the `connect` caller
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    DetailedIoError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// a frame the peer sent cannot be honored (bad tag, oversized body,
    /// header/body length mismatch)
    #[error("malformed protocol: {0}")]
    MalformedProtocol(String),

    /// peeking an empty message queue; local and recoverable
    #[error("empty queue")]
    EmptyQueue,

    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    #[error("tracing setup error: {0}")]
    TracingSetup(#[from] tracing::subscriber::SetGlobalDefaultError),
}
