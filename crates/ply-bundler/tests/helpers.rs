//! Shared test utilities for ply-bundler tests

#![allow(dead_code)]

use ply_bundler::{BundleResult, Bundler, BundlerConfig, ScriptPlugin};
use ply_plugin_css::CssPlugin;
use ply_vfs::{FlatFiles, VirtualFileStore};

/// Builds a snapshot through the store, the way the editor does.
pub fn project(files: &[(&str, &str)]) -> FlatFiles {
    let mut store = VirtualFileStore::new();
    for (path, content) in files {
        let _ = store.create_file(path, *content).expect("create file");
    }
    store.flatten()
}

/// Plugin order of the script dialect: css, then script.
pub fn script_bundler() -> Bundler {
    Bundler::new(BundlerConfig::default())
        .plugin(CssPlugin::default())
        .plugin(ScriptPlugin::new())
}

pub fn bundle(files: &[(&str, &str)]) -> BundleResult {
    script_bundler().bundle(&project(files))
}

/// Assert that the bundle succeeded and its JS contains a substring
pub fn assert_js_contains(result: &BundleResult, substring: &str) {
    assert!(result.error.is_none(), "bundle failed: {:?}", result.error);
    assert!(
        result.js.contains(substring),
        "Expected bundle to contain '{}'.\nBundle preview (first 800 chars): {}",
        substring,
        &result.js[..result.js.len().min(800)]
    );
}

/// Assert that the bundle parses as an ES module.
pub fn assert_valid_module(js: &str) {
    let allocator = oxc_allocator::Allocator::default();
    let parsed = oxc_parser::Parser::new(&allocator, js, oxc_span::SourceType::mjs()).parse();
    assert!(
        parsed.errors.is_empty(),
        "bundle is not a valid module: {:?}\n{js}",
        parsed.errors
    );
}

/// Runs a bundle with node and returns its trimmed stdout.
///
/// Returns `None` when node is not installed, so execution checks are skipped
/// on machines without it. Bundles with CDN imports cannot run offline.
pub fn run_with_node(js: &str) -> Option<String> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let available = Command::new("node")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());
    if !available {
        eprintln!("node not found, skipping bundle execution");
        return None;
    }

    let mut file = tempfile::Builder::new()
        .suffix(".mjs")
        .tempfile()
        .expect("create temp module");
    file.write_all(js.as_bytes()).expect("write bundle");

    let output = Command::new("node")
        .arg(file.path())
        .output()
        .expect("run node");
    assert!(
        output.status.success(),
        "bundle failed under node: {}\n{js}",
        String::from_utf8_lossy(&output.stderr)
    );
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Bundles `files`, checks the output parses, and runs it when node exists.
pub fn bundle_and_run(files: &[(&str, &str)]) -> Option<String> {
    let result = bundle(files);
    assert!(result.error.is_none(), "bundle failed: {:?}", result.error);
    assert_valid_module(&result.js);
    run_with_node(&result.js)
}
