//! `readerctl` harvests the text of books displayed in a desktop e-reader
//! on Linux (Wayland).
//!
//! It repeatedly captures the screen, turns the page with a simulated
//! arrow key, and stops when the book stops advancing or a page budget is
//! hit. The captured pages are written as numbered PNG files, run through
//! OCR, optionally uploaded to Google Drive, and optionally summarized
//! with an LLM.
//!
//! # Core Components
//! - [`CaptureLoop`]: the capture → compare → advance cycle with its retry
//!   and termination rules.
//! - [`PageComparer`]: decides whether two screenshots show the same page.
//! - [`probe_direction`]: figures out which arrow key turns the page.
//! - [`BookRun`]: the whole pipeline from window focus to summary.
//!
//! Screen capture uses the KWin ScreenShot2 D-Bus interface (KDE Plasma
//! 6.0+); key presses go through a uinput virtual device.

pub mod capture;
pub mod compare;
pub mod config;
mod error;
pub mod frame;
pub mod input;
pub mod ocr;
pub mod probe;
pub mod reader;
pub mod session;
pub mod storage;
pub mod summarize;
pub mod workflow;

pub use error::{Error, Result};

pub use capture::{KWinScreenSource, ScreenSource};
pub use compare::{PageComparer, PageVerdict};
pub use config::Config;
pub use frame::Frame;
pub use input::{Injector, PageKey, UinputInjector};
pub use probe::probe_direction;
pub use session::{
    AdvanceDirection, CaptureLoop, CaptureReport, PageRecord, PageSink, StopReason,
};
pub use storage::{BookPaths, DirSink, DriveClient};
pub use summarize::Summarizer;
pub use workflow::BookRun;
