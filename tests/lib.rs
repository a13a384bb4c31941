//! Integration test harness
//!
//! Run one area with `cargo test <module>`, e.g. `cargo test selection_test`.

pub mod algorithm {
    pub mod features_test;
    pub mod selection_test;
}

pub mod report {
    pub mod tables_test;
}

pub mod integration {
    pub mod end_to_end_test;
    pub mod loading_test;
}
