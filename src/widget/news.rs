// src/widget/news.rs
//! Headline ticker backed by an RSS feed, fetched through the rss2json
//! bridge so the device only ever parses JSON.

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
use crate::config::{ConfigMap, get_str, get_u64};
use crate::render::canvas::RegionCanvas;
use crate::render::framebuffer::PaletteColor;
use crate::widget::{DataMap, PullContext, RefreshMode, Widget, WidgetDescriptor, WidgetView};

pub static DESCRIPTOR: WidgetDescriptor = WidgetDescriptor {
    name: "news",
    version: "1.0.0",
    description: "RSS headlines",
    refresh: RefreshMode::Pull,
    interval: Duration::from_secs(3600),
    default_config: default_config,
};

fn default_config() -> ConfigMap {
    json!({
        "enabled": true,
        "rss_url": "http://feeds.bbci.co.uk/news/rss.xml",
        "max_headlines": 3,
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn create() -> Box<dyn Widget> {
    Box::new(NewsWidget)
}

pub struct NewsWidget;

#[async_trait(?Send)]
impl Widget for NewsWidget {
    fn descriptor(&self) -> &WidgetDescriptor {
        &DESCRIPTOR
    }

    async fn pull(
        &self,
        ctx: &PullContext<'_>,
        config: &ConfigMap,
    ) -> Result<DataMap, FetchError> {
        let rss_url = get_str(config, "rss_url", "");
        if rss_url.is_empty() {
            log::warn!("News widget: rss_url not configured");
            return Err(FetchError::MalformedResponse);
        }
        let max = get_u64(config, "max_headlines", 3) as usize;

        let url = format!("https://api.rss2json.com/v1/api.json?rss_url={rss_url}");
        let body = ctx.fetch_json(&url).await?;

        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or(FetchError::MalformedResponse)?;
        let headlines: Vec<Value> = items
            .iter()
            .filter_map(|item| item.get("title").and_then(Value::as_str))
            .take(max)
            .map(|title| json!(title))
            .collect();

        let mut data = DataMap::new();
        data.insert("headlines".into(), Value::Array(headlines));
        if let Some(feed) = body.get("feed").and_then(|f| f.get("title")) {
            data.insert("source".into(), feed.clone());
        }
        Ok(data)
    }

    fn render(
        &self,
        canvas: &mut RegionCanvas<'_>,
        view: &WidgetView<'_>,
    ) -> Result<bool, RenderError> {
        let Some(headlines) = view.data.get("headlines") else {
            return Ok(false);
        };
        let headlines = headlines
            .as_array()
            .ok_or(RenderError::MissingField("headlines"))?;
        if headlines.is_empty() {
            return Ok(false);
        }

        let size = canvas.size();
        let line_height = FONT_4X6.character_size.height + 1;
        let max_chars = (size.width / FONT_4X6.character_size.width) as usize;
        let mut y = 1i32;
        let mut drew = false;

        for headline in headlines {
            if y as u32 + line_height > size.height {
                break;
            }
            let Some(title) = headline.as_str() else {
                continue;
            };
            let shown: String = title.chars().take(max_chars).collect();
            let color = if drew {
                PaletteColor::WHITE
            } else {
                PaletteColor::CYAN
            };
            Text::with_baseline(
                &shown,
                Point::new(1, y),
                MonoTextStyle::new(&FONT_4X6, color),
                Baseline::Top,
            )
            .draw(canvas)
            .ok();
            y += line_height as i32;
            drew = true;
        }
        Ok(drew)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::client::testing::ScriptedSource;
    use crate::widget::testing::FixedClock;
    use embassy_futures::block_on;

    fn ctx<'a>(source: &'a ScriptedSource, clock: &'a FixedClock) -> PullContext<'a> {
        PullContext {
            source,
            clock,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_pull_takes_bounded_headlines() {
        let body = json!({
            "feed": {"title": "BBC News"},
            "items": [
                {"title": "one"}, {"title": "two"}, {"title": "three"}, {"title": "four"},
            ],
        });
        let source = ScriptedSource::new(vec![Ok(body)]);
        let clock = FixedClock(None);

        let data = block_on(NewsWidget.pull(&ctx(&source, &clock), &default_config())).unwrap();
        let headlines = data.get("headlines").unwrap().as_array().unwrap();
        assert_eq!(headlines.len(), 3);
        assert_eq!(headlines[0], json!("one"));
        assert_eq!(data.get("source"), Some(&json!("BBC News")));
    }

    #[test]
    fn test_pull_without_items_is_malformed() {
        let source = ScriptedSource::new(vec![Ok(json!({"status": "ok"}))]);
        let clock = FixedClock(None);
        let err = block_on(NewsWidget.pull(&ctx(&source, &clock), &default_config())).unwrap_err();
        assert_eq!(err, FetchError::MalformedResponse);
    }

    #[test]
    fn test_pull_without_feed_url_fails_without_fetching() {
        let source = ScriptedSource::new(vec![]);
        let clock = FixedClock(None);
        let mut config = default_config();
        config.insert("rss_url".into(), json!(""));
        let err = block_on(NewsWidget.pull(&ctx(&source, &clock), &config)).unwrap_err();
        assert_eq!(err, FetchError::MalformedResponse);
        assert_eq!(source.call_count(), 0);
    }
}
