// src/widget/notice.rs
//! Push-mode message board. Data arrives from outside the pull schedule
//! (webhook or MQTT bridge via `Dashboard::push`); the scheduler never
//! touches this widget.

use alloc::boxed::Box;
use alloc::string::String;

use async_trait::async_trait;
use embassy_time::Duration;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use serde_json::{Value, json};

use crate::common::error::RenderError;
use crate::config::{ConfigMap, get_u64};
use crate::render::canvas::RegionCanvas;
use crate::render::framebuffer::PaletteColor;
use crate::widget::{DataMap, RefreshMode, Widget, WidgetDescriptor, WidgetView};

pub static DESCRIPTOR: WidgetDescriptor = WidgetDescriptor {
    name: "notice",
    version: "1.0.0",
    description: "Externally pushed messages",
    refresh: RefreshMode::Push,
    interval: Duration::from_secs(0),
    default_config: default_config,
};

fn default_config() -> ConfigMap {
    json!({
        "enabled": true,
        "color": 5,
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn create() -> Box<dyn Widget> {
    Box::new(NoticeWidget)
}

pub struct NoticeWidget;

#[async_trait(?Send)]
impl Widget for NoticeWidget {
    fn descriptor(&self) -> &WidgetDescriptor {
        &DESCRIPTOR
    }

    fn on_push(&self, topic: &str, payload: &Value, _config: &ConfigMap) -> Option<DataMap> {
        match topic {
            "message" => {
                let text = match payload {
                    Value::String(text) => text.as_str(),
                    other => other.get("text")?.as_str()?,
                };
                let mut data = DataMap::new();
                data.insert("text".into(), json!(text));
                Some(data)
            }
            "clear" => Some(DataMap::new()),
            _ => None,
        }
    }

    fn render(
        &self,
        canvas: &mut RegionCanvas<'_>,
        view: &WidgetView<'_>,
    ) -> Result<bool, RenderError> {
        let Some(text) = view.data.get("text").and_then(Value::as_str) else {
            return Ok(false);
        };

        let size = canvas.size();
        let max_chars = (size.width / FONT_5X8.character_size.width) as usize;
        let shown: String = text.chars().take(max_chars).collect();
        let color = PaletteColor(get_u64(view.config, "color", 5) as u8);
        Text::with_baseline(
            &shown,
            Point::new(1, 1),
            MonoTextStyle::new(&FONT_5X8, color),
            Baseline::Top,
        )
        .draw(canvas)
        .ok();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_message_payloads() {
        let config = default_config();
        let data = NoticeWidget
            .on_push("message", &json!({"text": "door open"}), &config)
            .unwrap();
        assert_eq!(data.get("text"), Some(&json!("door open")));

        // Bare string payloads are accepted too.
        let data = NoticeWidget
            .on_push("message", &json!("hello"), &config)
            .unwrap();
        assert_eq!(data.get("text"), Some(&json!("hello")));
    }

    #[test]
    fn test_push_clear_and_unknown_topic() {
        let config = default_config();
        assert_eq!(
            NoticeWidget.on_push("clear", &Value::Null, &config),
            Some(DataMap::new())
        );
        assert_eq!(NoticeWidget.on_push("volume", &json!(3), &config), None);
    }
}
