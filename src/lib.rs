//! # jde-classpath
//!
//! Support library for an Emacs Java development environment.
//!
//! ## Architecture
//!
//! - **scan**: Class name normalization and directory walking
//! - **catalog**: Class listing of jar/zip archives
//! - **jimage**: Class listing of the JDK 9+ module image via `jimage list`
//! - **source**: Listing providers (directory, archive, class list, jimage)
//! - **entry**: Lazily loaded classpath entries, the immutable decorator and the shared entry cache
//! - **project**: Classpath tokenizing, boot classpath, project classes and the workspace
//! - **cache**: Persistent listing cache backed by LMDB
//! - **lisp**: Lisp values, their printed form and a reader
//! - **bridge**: Line protocol with Emacs, including callbacks into Emacs Lisp
//! - **handler**: Bridge methods over the workspace
//! - **cli** / **config**: Command line and settings resolution

pub mod bridge;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod entry;
pub mod handler;
pub mod jimage;
pub mod lisp;
pub mod project;
pub mod scan;
pub mod source;
