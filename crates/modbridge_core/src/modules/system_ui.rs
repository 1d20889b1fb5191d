//! System UI module: window bar colors, foreground styles, visibility and
//! appearance.
//!
//! # Invariants
//! - Runs on the main queue; every call reads or writes the shared
//!   [`WindowState`] resolved in `on_create`.
//! - Colors are reported as lowercase `#rrggbb`.
//! - Unknown color/style/visibility/appearance values reject with
//!   `invalid-value` and leave the window untouched.

use crate::arguments::Arguments;
use crate::error::InvocationError;
use crate::module::{Arity, ExportedModule, MethodQueue, MethodTable};
use crate::modules::window_state::{Appearance, BarStyle, Rgb, WindowSnapshot, WindowState};
use crate::registry::{ModuleRegistry, RegistryError};
use crate::value::BridgeValue;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;

pub const INVALID_VALUE: &str = "invalid-value";
pub const UNAVAILABLE: &str = "unavailable";

type Getter = fn(&WindowSnapshot) -> Rgb;
type Setter = fn(&mut WindowSnapshot, Rgb);

#[derive(Default)]
pub struct SystemUi {
    window: Mutex<Option<Arc<WindowState>>>,
}

impl SystemUi {
    fn window(&self) -> Result<Arc<WindowState>, InvocationError> {
        self.window.lock().clone().ok_or_else(|| {
            InvocationError::rejected(UNAVAILABLE, "window state is not available")
        })
    }

    fn color(&self, pick: Getter) -> Result<BridgeValue, InvocationError> {
        Ok(BridgeValue::from(pick(&self.window()?.snapshot()).to_hex()))
    }

    fn set_color(
        &self,
        args: &Arguments,
        what: &str,
        apply: Setter,
    ) -> Result<BridgeValue, InvocationError> {
        let raw = args.str_at(0)?;
        let color = Rgb::parse_hex(raw).ok_or_else(|| {
            InvocationError::rejected(
                INVALID_VALUE,
                format!("Value \"{raw}\" is not a valid {what} color"),
            )
        })?;
        self.window()?.update(|window| apply(window, color));
        debug!("event=system_ui_update module=system_ui status=ok field={what}");
        Ok(BridgeValue::Null)
    }

    fn divider_window(&self, method: &str) -> Result<Arc<WindowState>, InvocationError> {
        let window = self.window()?;
        if !window.divider_supported() {
            return Err(InvocationError::rejected(
                UNAVAILABLE,
                format!("'{method}' is not supported by this window"),
            ));
        }
        Ok(window)
    }

    fn set_style(
        &self,
        args: &Arguments,
        what: &str,
        apply: fn(&mut WindowSnapshot, BarStyle),
    ) -> Result<BridgeValue, InvocationError> {
        let raw = args.str_at(0)?;
        let style = BarStyle::parse(raw).ok_or_else(|| {
            InvocationError::rejected(
                INVALID_VALUE,
                format!("Value \"{raw}\" is not a valid {what} foreground style"),
            )
        })?;
        self.window()?.update(|window| apply(window, style));
        Ok(BridgeValue::Null)
    }
}

impl ExportedModule for SystemUi {
    const NAME: &'static str = "ExpoSystemUI";
    type Config = ();

    fn methods() -> MethodTable<Self> {
        MethodTable::<Self>::new()
            .sync(
                "getStatusBarBackgroundColor",
                "getStatusBarBackgroundColor",
                Arity::exactly(0),
                |module, _| module.color(|window| window.status_bar_color),
            )
            .sync(
                "setStatusBarBackgroundColor",
                "setStatusBarBackgroundColor:",
                Arity::exactly(1),
                |module, args| {
                    module.set_color(args, "status bar", |window, color| {
                        window.status_bar_color = color;
                    })
                },
            )
            .sync(
                "getNavigationBarBackgroundColor",
                "getNavigationBarBackgroundColor",
                Arity::exactly(0),
                |module, _| module.color(|window| window.navigation_bar_color),
            )
            .sync(
                "setNavigationBarBackgroundColor",
                "setNavigationBarBackgroundColor:",
                Arity::exactly(1),
                |module, args| {
                    module.set_color(args, "navigation bar", |window, color| {
                        window.navigation_bar_color = color;
                    })
                },
            )
            .sync(
                "getNavigationBarDividerColor",
                "getNavigationBarDividerColor",
                Arity::exactly(0),
                |module, args| {
                    let window = module.divider_window(args.method())?;
                    Ok(BridgeValue::from(
                        window.snapshot().navigation_bar_divider_color.to_hex(),
                    ))
                },
            )
            .sync(
                "setNavigationBarDividerColor",
                "setNavigationBarDividerColor:",
                Arity::exactly(1),
                |module, args| {
                    module.divider_window(args.method())?;
                    module.set_color(args, "navigation bar divider", |window, color| {
                        window.navigation_bar_divider_color = color;
                    })
                },
            )
            .sync(
                "getStatusBarForegroundStyle",
                "getStatusBarForegroundStyle",
                Arity::exactly(0),
                |module, _| {
                    let style = module.window()?.snapshot().status_bar_style;
                    Ok(BridgeValue::from(style.as_str()))
                },
            )
            .sync(
                "setStatusBarForegroundStyle",
                "setStatusBarForegroundStyle:",
                Arity::exactly(1),
                |module, args| {
                    module.set_style(args, "status bar", |window, style| {
                        window.status_bar_style = style;
                    })
                },
            )
            .sync(
                "getNavigationBarForegroundStyle",
                "getNavigationBarForegroundStyle",
                Arity::exactly(0),
                |module, _| {
                    let style = module.window()?.snapshot().navigation_bar_style;
                    Ok(BridgeValue::from(style.as_str()))
                },
            )
            .sync(
                "setNavigationBarForegroundStyle",
                "setNavigationBarForegroundStyle:",
                Arity::exactly(1),
                |module, args| {
                    module.set_style(args, "navigation bar", |window, style| {
                        window.navigation_bar_style = style;
                    })
                },
            )
            .sync(
                "setSystemUiVisibility",
                "setSystemUiVisibility:",
                Arity::exactly(1),
                |module, args| {
                    let visible = match args.str_at(0)? {
                        "visible" => true,
                        "hidden" => false,
                        other => {
                            return Err(InvocationError::rejected(
                                INVALID_VALUE,
                                format!("Value \"{other}\" is not a valid system UI visibility"),
                            ))
                        }
                    };
                    module
                        .window()?
                        .update(|window| window.system_bars_visible = visible);
                    Ok(BridgeValue::Null)
                },
            )
            .sync(
                "getAppearance",
                "getAppearance",
                Arity::exactly(0),
                |module, _| {
                    let appearance = module.window()?.snapshot().appearance;
                    Ok(BridgeValue::from(appearance.as_str()))
                },
            )
            .sync(
                "setAppearance",
                "setAppearance:",
                Arity::exactly(1),
                |module, args| {
                    let raw = args.str_at(0)?;
                    let appearance = Appearance::parse(raw).ok_or_else(|| {
                        InvocationError::rejected(
                            INVALID_VALUE,
                            format!("Value \"{raw}\" is not a valid appearance"),
                        )
                    })?;
                    module
                        .window()?
                        .update(|window| window.appearance = appearance);
                    Ok(BridgeValue::Null)
                },
            )
    }

    fn snapshot(&self) -> Self::Config {}

    fn from_snapshot(_config: Self::Config) -> Result<Self, RegistryError> {
        Ok(Self::default())
    }

    fn method_queue(&self) -> MethodQueue {
        MethodQueue::Main
    }

    fn on_create(&self, registry: &ModuleRegistry) {
        let window = registry.internal::<WindowState>();
        if window.is_none() {
            warn!("event=module_create module=system_ui status=error error_code=window_state_missing");
        }
        *self.window.lock() = window;
    }

    fn on_destroy(&self) {
        self.window.lock().take();
    }
}
