//! Run orchestration — the single fetch → extract → normalize → value →
//! evaluate → persist pass.

pub mod pipeline;
