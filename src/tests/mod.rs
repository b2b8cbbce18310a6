mod html;
mod inline;
mod memory_fs;
mod resolve;

use self::memory_fs::MemoryFS;
use crate::{BundleOptions, Bundler};

pub(crate) const LOADER: &str = include_str!("../loader/require.js");

pub(crate) fn bundler(files: &[(&str, &str)]) -> Bundler<MemoryFS> {
    bundler_with(files, BundleOptions::default())
}

pub(crate) fn bundler_with(files: &[(&str, &str)], options: BundleOptions) -> Bundler<MemoryFS> {
    Bundler::new_with_file_system(MemoryFS::new(files), options)
}

/// Bundle a single entry and return the composed output.
pub(crate) fn save(files: &[(&str, &str)], entry: &str) -> String {
    save_with(files, entry, BundleOptions::default())
}

pub(crate) fn save_with(files: &[(&str, &str)], entry: &str, options: BundleOptions) -> String {
    let mut bundler = bundler_with(files, options);
    let id = bundler.get_module(entry.as_ref()).unwrap();
    bundler.save(id).code
}
