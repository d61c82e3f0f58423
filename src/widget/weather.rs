// src/widget/weather.rs
//! Weather widget backed by the wttr.in JSON API.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};

use async_trait::async_trait;
use embassy_time::Duration;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_4X6, FONT_5X8};
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use serde_json::{Value, json};

use crate::common::error::{FetchError, RenderError};
use crate::config::{ConfigMap, get_str};
use crate::render::canvas::RegionCanvas;
use crate::render::framebuffer::PaletteColor;
use crate::widget::{DataMap, PullContext, RefreshMode, Widget, WidgetDescriptor, WidgetView};

pub static DESCRIPTOR: WidgetDescriptor = WidgetDescriptor {
    name: "weather",
    version: "1.0.0",
    description: "Weather conditions via wttr.in",
    refresh: RefreshMode::Pull,
    interval: Duration::from_secs(600),
    default_config: default_config,
};

fn default_config() -> ConfigMap {
    json!({
        "enabled": true,
        // "auto" lets the service geolocate by IP.
        "location": "auto",
        "units": "metric",
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn create() -> Box<dyn Widget> {
    Box::new(WeatherWidget)
}

pub struct WeatherWidget;

fn str_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut node = root;
    for key in path {
        node = match node {
            Value::Array(items) => items.first()?,
            _ => node,
        };
        node = node.get(key)?;
    }
    match node {
        Value::Array(items) => items.first()?.as_str(),
        other => other.as_str(),
    }
}

#[async_trait(?Send)]
impl Widget for WeatherWidget {
    fn descriptor(&self) -> &WidgetDescriptor {
        &DESCRIPTOR
    }

    async fn pull(
        &self,
        ctx: &PullContext<'_>,
        config: &ConfigMap,
    ) -> Result<DataMap, FetchError> {
        let location = match get_str(config, "location", "auto") {
            "auto" => "",
            city => city,
        };
        let url = format!("https://wttr.in/{location}?format=j1");
        let body = ctx.fetch_json(&url).await?;

        let temp_key = if get_str(config, "units", "metric") == "imperial" {
            "temp_F"
        } else {
            "temp_C"
        };
        let current = body
            .get("current_condition")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or(FetchError::MalformedResponse)?;
        let temp = current
            .get(temp_key)
            .and_then(Value::as_str)
            .ok_or(FetchError::MalformedResponse)?;

        let mut data = DataMap::new();
        data.insert("temp".into(), json!(temp));
        data.insert(
            "condition".into(),
            json!(str_path(current, &["weatherDesc", "value"]).unwrap_or("Unknown")),
        );
        data.insert(
            "humidity".into(),
            json!(current.get("humidity").and_then(Value::as_str).unwrap_or("?")),
        );
        data.insert(
            "wind".into(),
            json!(
                current
                    .get("windspeedKmph")
                    .and_then(Value::as_str)
                    .unwrap_or("?")
            ),
        );
        data.insert(
            "location".into(),
            json!(str_path(&body, &["nearest_area", "areaName", "value"]).unwrap_or("Unknown")),
        );
        Ok(data)
    }

    fn render(
        &self,
        canvas: &mut RegionCanvas<'_>,
        view: &WidgetView<'_>,
    ) -> Result<bool, RenderError> {
        let Some(temp) = view.data.get("temp").and_then(Value::as_str) else {
            return Ok(false);
        };

        let unit = if get_str(view.config, "units", "metric") == "imperial" {
            "F"
        } else {
            "C"
        };
        let size = canvas.size();

        let headline = format!("{temp}{unit}");
        Text::with_baseline(
            &headline,
            Point::new(1, 1),
            MonoTextStyle::new(&FONT_5X8, PaletteColor::YELLOW),
            Baseline::Top,
        )
        .draw(canvas)
        .ok();

        let condition = view
            .data
            .get("condition")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let max_chars = (size.width / FONT_4X6.character_size.width) as usize;
        let condition: String = condition.chars().take(max_chars).collect();
        if !condition.is_empty() && size.height > 10 {
            Text::with_baseline(
                &condition,
                Point::new(1, 10),
                MonoTextStyle::new(&FONT_4X6, PaletteColor::WHITE),
                Baseline::Top,
            )
            .draw(canvas)
            .ok();
        }
        Ok(true)
    }
}
