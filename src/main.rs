//! This file is part of demandd.
//! Licensed under the GNU GPL v3 or later.

use demandd::daemon::{logging, runtime};

fn main() {
    logging::init();
    log::info!("demandd starting");
    if let Err(e) = runtime::run() {
        log::error!("Fatal: {e}");
        std::process::exit(1);
    }
    log::info!("demandd stopped cleanly");
}
