// src/render/cycle.rs
//! Fixed-rate frame composition.
//!
//! The cycle owns the framebuffer and the sink; nothing else ever writes a
//! pixel. One frame is a single synchronous section: rotate screen if due,
//! clear, render every enabled widget of the current screen in registration
//! order, present exactly once. Widgets render from a per-widget snapshot
//! taken under the slot lock, so each widget's pixels are internally
//! consistent even while pulls land concurrently.

use alloc::boxed::Box;
use alloc::vec::Vec;

use embassy_time::Instant;

use crate::dashboard::Dashboard;
use crate::render::canvas::RegionCanvas;
use crate::render::framebuffer::{FrameBuffer, FrameSink, PaletteColor};
use crate::screen::ClearMode;
use crate::widget::WidgetView;

pub struct RenderCycle {
    frame: FrameBuffer,
    sink: Box<dyn FrameSink>,
}

impl RenderCycle {
    pub fn new(frame: FrameBuffer, sink: Box<dyn FrameSink>) -> Self {
        Self { frame, sink }
    }

    /// Compose and present one frame. Synchronous from clear to present; a
    /// partially drawn buffer is never observable outside this call.
    pub fn render_frame(&mut self, dashboard: &Dashboard, now: Instant) {
        let (slots, clear_mode): (Vec<usize>, ClearMode) = dashboard.with_screens(|screens| {
            screens.rotate_if_due(now);
            let screen = screens.current();
            (screen.slots.clone(), screen.clear_mode)
        });

        if clear_mode == ClearMode::WholeScreen {
            self.frame.clear(PaletteColor::BACKGROUND);
        }

        for index in slots {
            let Some(slot) = dashboard.slot(index) else {
                continue;
            };
            let Some(snapshot) = slot.render_snapshot() else {
                // Disabled widgets simply stop appearing; under whole-screen
                // clear their region stays blank.
                continue;
            };

            if clear_mode == ClearMode::WidgetRegion {
                self.frame
                    .clear_region(snapshot.region, PaletteColor::BACKGROUND);
            }

            let mut canvas = RegionCanvas::new(&mut self.frame, snapshot.region);
            let view = WidgetView {
                data: &snapshot.data,
                config: &snapshot.config,
            };
            if let Err(err) = slot.widget.render(&mut canvas, &view) {
                // Region-local fault: log and move on to the next widget.
                log::warn!("Error rendering widget '{}': {err}", slot.name());
            }
        }

        if let Err(err) =
            self.sink
                .push_frame(self.frame.data(), self.frame.width(), self.frame.height())
        {
            log::error!("Frame present failed: {err}");
        }
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::RenderError;
    use crate::config::ConfigMap;
    use crate::dashboard::Dashboard;
    use crate::widget::registry::WidgetRegistry;
    use crate::widget::{RefreshMode, Widget, WidgetDescriptor};

    use async_trait::async_trait;
    use embassy_futures::block_on;
    use embassy_time::Duration;
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Sink that counts presents and keeps the last pushed frame.
    #[derive(Default)]
    struct CaptureSink {
        presents: Arc<AtomicU32>,
        last: Arc<Mutex<Vec<u8>>>,
    }

    impl FrameSink for CaptureSink {
        fn push_frame(&mut self, pixels: &[u8], _w: u32, _h: u32) -> Result<(), RenderError> {
            self.presents.fetch_add(1, Ordering::Relaxed);
            *self.last.lock().unwrap() = pixels.to_vec();
            Ok(())
        }
    }

    macro_rules! solid_widget {
        ($ty:ident, $desc:ident, $create:ident, $name:literal, $color:expr) => {
            static $desc: WidgetDescriptor = WidgetDescriptor {
                name: $name,
                version: "1.0.0",
                description: "test fill",
                refresh: RefreshMode::Push,
                interval: Duration::from_secs(0),
                default_config: ConfigMap::new,
            };

            struct $ty;

            #[async_trait(?Send)]
            impl Widget for $ty {
                fn descriptor(&self) -> &WidgetDescriptor {
                    &$desc
                }

                fn render(
                    &self,
                    canvas: &mut RegionCanvas<'_>,
                    _view: &crate::widget::WidgetView<'_>,
                ) -> Result<bool, RenderError> {
                    let size = canvas.size();
                    Rectangle::new(Point::zero(), size)
                        .into_styled(PrimitiveStyle::with_fill($color))
                        .draw(canvas)
                        .ok();
                    Ok(true)
                }
            }

            fn $create() -> alloc::boxed::Box<dyn Widget> {
                alloc::boxed::Box::new($ty)
            }
        };
    }

    solid_widget!(BoxA, BOX_A_DESC, create_box_a, "boxa", PaletteColor::RED);
    solid_widget!(BoxB, BOX_B_DESC, create_box_b, "boxb", PaletteColor::GREEN);

    static FAULTY_DESC: WidgetDescriptor = WidgetDescriptor {
        name: "faulty",
        version: "1.0.0",
        description: "always fails to render",
        refresh: RefreshMode::Push,
        interval: Duration::from_secs(0),
        default_config: ConfigMap::new,
    };

    struct FaultyWidget;

    #[async_trait(?Send)]
    impl Widget for FaultyWidget {
        fn descriptor(&self) -> &WidgetDescriptor {
            &FAULTY_DESC
        }

        fn render(
            &self,
            _canvas: &mut RegionCanvas<'_>,
            _view: &crate::widget::WidgetView<'_>,
        ) -> Result<bool, RenderError> {
            Err(RenderError::MissingField("boom"))
        }
    }

    fn create_faulty() -> alloc::boxed::Box<dyn Widget> {
        alloc::boxed::Box::new(FaultyWidget)
    }

    fn test_registry() -> WidgetRegistry {
        let mut registry = WidgetRegistry::new();
        registry.register(&BOX_A_DESC, create_box_a);
        registry.register(&BOX_B_DESC, create_box_b);
        registry.register(&FAULTY_DESC, create_faulty);
        registry
    }

    fn cycle_with_sink() -> (RenderCycle, Arc<AtomicU32>, Arc<Mutex<Vec<u8>>>) {
        let sink = CaptureSink::default();
        let presents = sink.presents.clone();
        let last = sink.last.clone();
        (
            RenderCycle::new(FrameBuffer::new(64, 64), Box::new(sink)),
            presents,
            last,
        )
    }

    #[test]
    fn test_faulty_widget_does_not_block_siblings() {
        // boxa and boxb own disjoint halves; faulty sits between them in
        // registration order and fails every frame.
        let config = json!({
            "screens": {
                "main": {
                    "widgets": [
                        {"name": "boxa", "x": 0, "y": 0, "width": 32, "height": 64},
                        {"name": "faulty", "x": 0, "y": 0, "width": 64, "height": 64},
                        {"name": "boxb", "x": 32, "y": 0, "width": 32, "height": 64},
                    ],
                },
            },
        });
        let dash = block_on(Dashboard::build(&config, &test_registry())).unwrap();
        let (mut cycle, presents, _) = cycle_with_sink();

        cycle.render_frame(&dash, Instant::from_secs(0));

        assert_eq!(presents.load(Ordering::Relaxed), 1);
        let frame = cycle.frame();
        assert_eq!(frame.pixel(0, 0), Some(PaletteColor::RED));
        assert_eq!(frame.pixel(31, 63), Some(PaletteColor::RED));
        assert_eq!(frame.pixel(32, 0), Some(PaletteColor::GREEN));
        assert_eq!(frame.pixel(63, 63), Some(PaletteColor::GREEN));
    }

    #[test]
    fn test_present_once_per_frame() {
        let config = json!({"plugins": {"boxa": {"enabled": true}}});
        let dash = block_on(Dashboard::build(&config, &test_registry())).unwrap();
        let (mut cycle, presents, _) = cycle_with_sink();

        for i in 0..5 {
            cycle.render_frame(&dash, Instant::from_secs(i));
        }
        assert_eq!(presents.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_disabled_widget_region_stays_blank() {
        let config = json!({
            "screens": {
                "main": {
                    "widgets": [
                        {"name": "boxa", "x": 0, "y": 0, "width": 32, "height": 64},
                        {"name": "boxb", "x": 32, "y": 0, "width": 32, "height": 64},
                    ],
                },
            },
        });
        let dash = block_on(Dashboard::build(&config, &test_registry())).unwrap();
        let update = json!({"enabled": false});
        assert!(dash.update_widget_config("boxb", update.as_object().unwrap()));

        let (mut cycle, _, _) = cycle_with_sink();
        cycle.render_frame(&dash, Instant::from_secs(0));

        assert_eq!(cycle.frame().pixel(0, 0), Some(PaletteColor::RED));
        assert_eq!(cycle.frame().pixel(40, 30), Some(PaletteColor::BACKGROUND));
    }

    #[test]
    fn test_region_clear_mode_preserves_rest_of_frame() {
        let config = json!({
            "screens": {
                "main": {
                    "clear_mode": "region",
                    "widgets": [
                        {"name": "boxa", "x": 0, "y": 0, "width": 16, "height": 16},
                    ],
                },
            },
        });
        let dash = block_on(Dashboard::build(&config, &test_registry())).unwrap();
        let (mut cycle, _, _) = cycle_with_sink();

        cycle.render_frame(&dash, Instant::from_secs(0));
        // Pixels outside the widget's region are not cleared in region mode.
        // Nothing else drew there, so paint one directly and re-render.
        cycle.frame.set_pixel(40, 40, PaletteColor::CYAN);
        cycle.render_frame(&dash, Instant::from_secs(1));

        assert_eq!(cycle.frame().pixel(0, 0), Some(PaletteColor::RED));
        assert_eq!(cycle.frame().pixel(40, 40), Some(PaletteColor::CYAN));
    }

    #[test]
    fn test_whole_screen_clear_wipes_stray_pixels() {
        let config = json!({"plugins": {"boxa": {"x": 0, "y": 0, "width": 16, "height": 16}}});
        let dash = block_on(Dashboard::build(&config, &test_registry())).unwrap();
        let (mut cycle, _, _) = cycle_with_sink();

        cycle.frame.set_pixel(40, 40, PaletteColor::CYAN);
        cycle.render_frame(&dash, Instant::from_secs(0));
        assert_eq!(cycle.frame().pixel(40, 40), Some(PaletteColor::BACKGROUND));
    }

    static GEN_DESC: WidgetDescriptor = WidgetDescriptor {
        name: "gen",
        version: "1.0.0",
        description: "paints its whole region with the data generation",
        refresh: RefreshMode::Pull,
        interval: Duration::from_secs(1),
        default_config: ConfigMap::new,
    };

    /// Fills the region with palette index = data["gen"].
    struct GenWidget;

    #[async_trait(?Send)]
    impl Widget for GenWidget {
        fn descriptor(&self) -> &WidgetDescriptor {
            &GEN_DESC
        }

        fn render(
            &self,
            canvas: &mut RegionCanvas<'_>,
            view: &crate::widget::WidgetView<'_>,
        ) -> Result<bool, RenderError> {
            let Some(generation) = view.data.get("gen").and_then(serde_json::Value::as_u64)
            else {
                return Ok(false);
            };
            let size = canvas.size();
            Rectangle::new(Point::zero(), size)
                .into_styled(PrimitiveStyle::with_fill(PaletteColor(generation as u8)))
                .draw(canvas)
                .ok();
            Ok(true)
        }
    }

    fn create_gen() -> alloc::boxed::Box<dyn Widget> {
        alloc::boxed::Box::new(GenWidget)
    }

    #[test]
    fn test_widget_pixels_come_from_one_data_generation() {
        let mut registry = WidgetRegistry::new();
        registry.register(&GEN_DESC, create_gen);
        let config = json!({"plugins": {"gen": {}}});
        let dash = block_on(Dashboard::build(&config, &registry)).unwrap();
        let (mut cycle, _, _) = cycle_with_sink();

        let commit = |generation: u64| {
            let mut data = crate::widget::DataMap::new();
            data.insert("gen".into(), json!(generation));
            dash.slots()[0].state.lock(|cell| {
                cell.borrow_mut().commit_success(
                    Instant::from_secs(generation),
                    Duration::from_secs(1),
                    data,
                )
            });
        };

        // Every presented frame shows exactly one generation across the
        // widget's region, even as pulls land between frames.
        for generation in [2u64, 3, 4] {
            commit(generation);
            cycle.render_frame(&dash, Instant::from_secs(generation));
            let seen: std::collections::BTreeSet<u8> =
                cycle.frame().data().iter().copied().collect();
            assert_eq!(
                seen.into_iter().collect::<Vec<_>>(),
                vec![generation as u8],
                "frame for generation {generation} must be uniform"
            );
        }
    }

    #[test]
    fn test_rotation_switches_rendered_screen() {
        let config = json!({
            "system": {"rotation_interval": 5},
            "screens": {
                "alpha": {"widgets": [{"name": "boxa"}]},
                "beta": {"widgets": [{"name": "boxb"}]},
            },
        });
        let dash = block_on(Dashboard::build(&config, &test_registry())).unwrap();
        let (mut cycle, _, _) = cycle_with_sink();

        // First frame arms the rotation deadline and renders screen 0.
        cycle.render_frame(&dash, Instant::from_secs(100));
        assert_eq!(cycle.frame().pixel(1, 1), Some(PaletteColor::RED));

        // After the interval the next frame renders the other screen.
        cycle.render_frame(&dash, Instant::from_secs(105));
        assert_eq!(cycle.frame().pixel(1, 1), Some(PaletteColor::GREEN));
    }
}
