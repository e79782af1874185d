//! Integration tests for panelkit

mod integration;
