//! Data-driven colony content.
//!
//! Loads resources, building templates, colony tuning and the starting map
//! from a directory of RON, TOML or JSON files and resolves them into
//! `tileworks-core` types.
//!
//! | Base name   | Required | Contents                                 |
//! |-------------|----------|------------------------------------------|
//! | `resources` | yes      | Resource kinds and their storage volume  |
//! | `buildings` | yes      | Production templates and conditions      |
//! | `colony`    | no       | Capacity, start stock, workforce tuning  |
//! | `map`       | no       | Resource tiles and pre-placed buildings  |

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GameData, Placement, load_game_data};
