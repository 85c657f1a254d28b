//! Built-in recipes for the HPCToolkit prerequisites

pub mod binutils;
pub mod boost;
pub mod build_system;
pub mod dyninst;
pub mod elfutils;
pub mod hpctoolkit;
pub mod hpctoolkit_prereqs;
pub mod intel_xed;
pub mod libdwarf;
pub mod libiberty;
pub mod libmonitor;
pub mod libunwind;
pub mod xz;
pub mod zlib;

use crate::core::recipe::Recipe;

/// Every built-in recipe
pub fn all() -> Vec<Box<dyn Recipe>> {
    vec![
        Box::new(binutils::Binutils::new()),
        Box::new(boost::Boost::new()),
        Box::new(dyninst::Dyninst::new()),
        Box::new(elfutils::Elfutils::new()),
        Box::new(hpctoolkit::Hpctoolkit::new()),
        Box::new(hpctoolkit_prereqs::HpctoolkitPrereqs::new()),
        Box::new(intel_xed::IntelXed::new()),
        Box::new(libdwarf::Libdwarf::new()),
        Box::new(libiberty::Libiberty::new()),
        Box::new(libmonitor::Libmonitor::new()),
        Box::new(libunwind::Libunwind::new()),
        Box::new(xz::Xz::new()),
        Box::new(zlib::Zlib::new()),
    ]
}
