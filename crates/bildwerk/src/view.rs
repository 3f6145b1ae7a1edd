// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive preview behind the `display` feature: a minimal eframe window
// that shows the buffer and closes on any key press.

use tracing::debug;

use crate::error::{BildwerkError, Result};
use crate::image::Image;
use crate::types::ResizeTarget;

impl Image {
    /// Open a blocking preview window titled `title`.
    ///
    /// Returns once a key is pressed or the window is closed. The buffer is
    /// rendered as an RGB texture at its native size.
    pub fn show(&self, title: &str) -> Result<()> {
        let rgb = self.rgb();
        let (w, h) = rgb.dimensions();
        debug!(title, width = w, height = h, "Opening preview window");

        let app = PreviewApp {
            size: [w as usize, h as usize],
            pixels: rgb.into_raw(),
            texture: None,
        };
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(title)
                .with_inner_size([w as f32, h as f32]),
            ..Default::default()
        };
        eframe::run_native(title, options, Box::new(move |_cc| Ok(Box::new(app))))
            .map_err(|err| BildwerkError::Display(format!("preview window failed: {}", err)))
    }

    /// Preview a resized copy, leaving the buffer untouched.
    pub fn show_resized(&self, title: &str, target: ResizeTarget) -> Result<()> {
        let mut copy = self.clone();
        copy.resize(target)?;
        copy.show(title)
    }
}

struct PreviewApp {
    size: [usize; 2],
    pixels: Vec<u8>,
    texture: Option<egui::TextureHandle>,
}

impl eframe::App for PreviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.texture.is_none() {
            let image = egui::ColorImage::from_rgb(self.size, &self.pixels);
            self.texture =
                Some(ctx.load_texture("bildwerk_preview", image, egui::TextureOptions::LINEAR));
        }

        let any_key = ctx.input(|i| {
            i.events
                .iter()
                .any(|e| matches!(e, egui::Event::Key { pressed: true, .. }))
        });
        if any_key {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        if let Some(texture) = &self.texture {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.image(texture);
                });
            });
        }
    }
}
