// src/widget/hackernews.rs
//! Hacker News front-page widget: top story ids first, then one item fetch
//! per story.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use async_trait::async_trait;
use embassy_time::Duration;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_4X6;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use serde_json::{Value, json};

use crate::common::error::{FetchError, RenderError};
use crate::config::{ConfigMap, get_u64};
use crate::render::canvas::RegionCanvas;
use crate::render::framebuffer::PaletteColor;
use crate::widget::{DataMap, PullContext, RefreshMode, Widget, WidgetDescriptor, WidgetView};

pub static DESCRIPTOR: WidgetDescriptor = WidgetDescriptor {
    name: "hackernews",
    version: "1.0.0",
    description: "Hacker News top stories",
    refresh: RefreshMode::Pull,
    interval: Duration::from_secs(1800),
    default_config: default_config,
};

fn default_config() -> ConfigMap {
    json!({
        "enabled": true,
        "story_count": 3,
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn create() -> Box<dyn Widget> {
    Box::new(HackerNewsWidget)
}

pub struct HackerNewsWidget;

#[async_trait(?Send)]
impl Widget for HackerNewsWidget {
    fn descriptor(&self) -> &WidgetDescriptor {
        &DESCRIPTOR
    }

    async fn pull(
        &self,
        ctx: &PullContext<'_>,
        config: &ConfigMap,
    ) -> Result<DataMap, FetchError> {
        let count = get_u64(config, "story_count", 3).clamp(1, 10) as usize;

        let ids = ctx
            .fetch_json("https://hacker-news.firebaseio.com/v0/topstories.json")
            .await?;
        let ids = ids.as_array().ok_or(FetchError::MalformedResponse)?;

        let mut stories: Vec<Value> = Vec::new();
        for id in ids.iter().take(count) {
            let Some(id) = id.as_u64() else {
                continue;
            };
            let url = format!("https://hacker-news.firebaseio.com/v0/item/{id}.json");
            // A single missing item is not worth failing the whole pull.
            let Ok(item) = ctx.fetch_json(&url).await else {
                continue;
            };
            let Some(title) = item.get("title").and_then(Value::as_str) else {
                continue;
            };
            stories.push(json!({
                "title": title,
                "score": item.get("score").and_then(Value::as_u64).unwrap_or(0),
            }));
        }

        if stories.is_empty() {
            return Err(FetchError::MalformedResponse);
        }
        let mut data = DataMap::new();
        data.insert("stories".into(), Value::Array(stories));
        Ok(data)
    }

    fn render(
        &self,
        canvas: &mut RegionCanvas<'_>,
        view: &WidgetView<'_>,
    ) -> Result<bool, RenderError> {
        let Some(stories) = view.data.get("stories") else {
            return Ok(false);
        };
        let stories = stories
            .as_array()
            .ok_or(RenderError::MissingField("stories"))?;
        if stories.is_empty() {
            return Ok(false);
        }

        let size = canvas.size();
        let line_height = FONT_4X6.character_size.height + 1;
        let max_chars = (size.width / FONT_4X6.character_size.width) as usize;

        Text::with_baseline(
            "HN",
            Point::new(1, 1),
            MonoTextStyle::new(&FONT_4X6, PaletteColor::YELLOW),
            Baseline::Top,
        )
        .draw(canvas)
        .ok();

        let mut y = 1 + line_height as i32;
        for story in stories {
            if y as u32 + line_height > size.height {
                break;
            }
            let Some(title) = story.get("title").and_then(Value::as_str) else {
                continue;
            };
            let shown: String = title.chars().take(max_chars).collect();
            Text::with_baseline(
                &shown,
                Point::new(1, y),
                MonoTextStyle::new(&FONT_4X6, PaletteColor::WHITE),
                Baseline::Top,
            )
            .draw(canvas)
            .ok();
            y += line_height as i32;
        }
        Ok(true)
    }
}
