//! Engine options exposed over the protocol.

pub const MAX_HASH_MB: usize = 33_554_432;
pub const MAX_THREADS: usize = 1024;

/// Current option values. Side effects of changing one (resizing the table,
/// re-spawning workers) are handled by the command loop.
pub struct UciOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub move_overhead: i64,
    pub multi_pv: usize,
    pub minimal: bool,
    pub syzygy_path: String,
}

impl Default for UciOptions {
    fn default() -> Self {
        UciOptions {
            hash_mb: 64,
            threads: 1,
            move_overhead: 10,
            multi_pv: 1,
            minimal: false,
            syzygy_path: String::new(),
        }
    }
}

fn print_spin(name: &str, default: impl std::fmt::Display, min: usize, max: usize) {
    println!("option name {name} type spin default {default} min {min} max {max}");
}

impl UciOptions {
    pub fn print(&self) {
        print_spin("Hash", 64, 1, MAX_HASH_MB);
        print_spin("Threads", 1, 1, MAX_THREADS);
        print_spin("Move Overhead", 10, 0, 1000);
        print_spin("MultiPV", 1, 1, crate::board::types::MAX_MOVES);
        println!("option name Clear Hash type button");
        println!("option name Minimal type check default false");
        println!("option name SyzygyPath type string default <empty>");
    }
}
