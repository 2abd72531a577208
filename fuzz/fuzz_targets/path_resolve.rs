#![no_main]

use std::path::{Component, Path};

use fsbot_engine::{normalize_path, resolve_path};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let token = String::from_utf8_lossy(data);
    let resolved = resolve_path(&token, Path::new("/srv/files"));
    // a relative HOME may legitimately keep leading `..`
    if !resolved.is_absolute() {
        return;
    }
    assert!(!resolved
        .components()
        .any(|component| matches!(component, Component::CurDir | Component::ParentDir)));
    assert_eq!(normalize_path(&resolved), resolved);
});
