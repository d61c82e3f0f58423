// src/widget/clock.rs
//! Digital clock widget. Pulls the synchronized wall clock once per second
//! and renders HH:MM (optionally :SS) centered in its region.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;

use async_trait::async_trait;
use embassy_time::Duration;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use serde_json::json;

use crate::common::error::{FetchError, RenderError};
use crate::config::{ConfigMap, get_bool, get_u64};
use crate::render::canvas::RegionCanvas;
use crate::render::framebuffer::PaletteColor;
use crate::widget::{DataMap, PullContext, RefreshMode, Widget, WidgetDescriptor, WidgetView};

pub static DESCRIPTOR: WidgetDescriptor = WidgetDescriptor {
    name: "clock",
    version: "1.0.0",
    description: "Digital clock",
    refresh: RefreshMode::Pull,
    interval: Duration::from_secs(1),
    default_config: default_config,
};

fn default_config() -> ConfigMap {
    json!({
        "enabled": true,
        "format_24h": true,
        "show_seconds": false,
        "tz_offset_minutes": 0,
        "color": 7,
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn create() -> Box<dyn Widget> {
    Box::new(ClockWidget)
}

pub struct ClockWidget;

#[async_trait(?Send)]
impl Widget for ClockWidget {
    fn descriptor(&self) -> &WidgetDescriptor {
        &DESCRIPTOR
    }

    async fn pull(
        &self,
        ctx: &PullContext<'_>,
        _config: &ConfigMap,
    ) -> Result<DataMap, FetchError> {
        // Before the first time sync there is nothing to show; an empty map
        // is a successful pull, not an error worth the budget.
        let mut data = DataMap::new();
        if let Some(epoch) = ctx.epoch_seconds() {
            data.insert("epoch".into(), json!(epoch));
        }
        Ok(data)
    }

    fn render(
        &self,
        canvas: &mut RegionCanvas<'_>,
        view: &WidgetView<'_>,
    ) -> Result<bool, RenderError> {
        let Some(epoch) = view.data.get("epoch") else {
            return Ok(false);
        };
        let epoch = epoch.as_i64().ok_or(RenderError::MissingField("epoch"))?;

        let offset_minutes = view
            .config
            .get("tz_offset_minutes")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        let local = epoch + offset_minutes * 60;
        let day_seconds = local.rem_euclid(86_400);
        let (hours, minutes, seconds) = (
            day_seconds / 3600,
            (day_seconds / 60) % 60,
            day_seconds % 60,
        );

        let hours = if get_bool(view.config, "format_24h", true) {
            hours
        } else {
            match hours % 12 {
                0 => 12,
                h => h,
            }
        };

        let text: String = if get_bool(view.config, "show_seconds", false) {
            format!("{hours:02}:{minutes:02}:{seconds:02}")
        } else {
            format!("{hours:02}:{minutes:02}")
        };

        let color = PaletteColor(get_u64(view.config, "color", 7) as u8);
        let style = MonoTextStyle::new(&FONT_6X10, color);
        let size = canvas.size();
        let text_width = (text.len() as u32) * FONT_6X10.character_size.width;
        let x = (size.width.saturating_sub(text_width) / 2) as i32;
        let y = (size.height.saturating_sub(FONT_6X10.character_size.height) / 2) as i32;

        Text::with_baseline(&text, Point::new(x, y), style, Baseline::Top)
            .draw(canvas)
            .ok();
        Ok(true)
    }
}
