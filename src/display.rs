// display.rs — side-by-side "input" / "output" viewers.
//
// Two plain minifb windows at native resolution. The call blocks until
// either window is closed or Escape is pressed in either.

use minifb::{Key, Window, WindowOptions};
use tracing::debug;

use crate::image::Raster;

fn open(title: &str, raster: &Raster) -> Result<Window, minifb::Error> {
    let mut window = Window::new(
        title,
        raster.width(),
        raster.height(),
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    )?;
    window.set_target_fps(60);
    Ok(window)
}

fn wants_close(window: &Window) -> bool {
    !window.is_open() || window.is_key_down(Key::Escape)
}

/// Show `input` and `output` until the user dismisses either viewer.
pub fn show_pair(input: &Raster, output: &Raster) -> Result<(), minifb::Error> {
    let input_fb = input.to_framebuffer();
    let output_fb = output.to_framebuffer();

    let mut input_window = open("input", input)?;
    let mut output_window = open("output", output)?;
    debug!(width = input.width(), height = input.height(), "viewers open");

    while !wants_close(&input_window) && !wants_close(&output_window) {
        input_window.update_with_buffer(&input_fb, input.width(), input.height())?;
        output_window.update_with_buffer(&output_fb, output.width(), output.height())?;
    }
    debug!("viewers closed");
    Ok(())
}
