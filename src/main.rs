//! Progressive MSA - Multiple Sequence Alignment Tool
//!
//! Desktop front end for progressive and center-star multiple alignment.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod app;

use app::MsaApp;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("Progressive MSA"),
        ..Default::default()
    };

    eframe::run_native(
        "Progressive MSA",
        native_options,
        Box::new(|cc| Ok(Box::new(MsaApp::new(cc)))),
    )
}
