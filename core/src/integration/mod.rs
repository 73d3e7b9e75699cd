//! Integration tests for the MeshScan pipeline
//!
//! Drive a full session (sensor events → cache → projector → export) and
//! check the files it leaves behind.
