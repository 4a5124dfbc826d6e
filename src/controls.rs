//! Keyboard controls for the render parameters.
//!
//! | Key     | Effect                                      |
//! |---------|---------------------------------------------|
//! | `F`     | toggle solid / wireframe                    |
//! | `T`/`G` | tessellation amount +1 / -1, within 0..=50  |
//! | `Y`/`H` | height scale +0.1 / -0.1, within 0..=5      |
//! | `U`/`J` | height bias +0.1 / -0.1, within 0..=5       |

use winit::keyboard::KeyCode;

use crate::{config::DemoConfig, frame::RenderParams, input::InputState};

const TESSELLATION_STEP: f32 = 1.0;
const HEIGHT_STEP: f32 = 0.1;

fn step(input: &InputState, up: KeyCode, down: KeyCode, value: &mut f32, by: f32, max: f32) -> bool {
    let delta = (input.was_key_pressed(up) as i32 - input.was_key_pressed(down) as i32) as f32 * by;
    if delta == 0.0 {
        return false;
    }
    let next = (*value + delta).clamp(0.0, max);
    let changed = next != *value;
    *value = next;
    changed
}

/// Applies this frame's key presses to `params`. Returns `true` if anything
/// changed.
pub fn apply_controls(params: &mut RenderParams, input: &InputState) -> bool {
    let mut changed = false;

    if input.was_key_pressed(KeyCode::KeyF) {
        params.fill_mode = params.fill_mode.toggled();
        changed = true;
    }
    changed |= step(
        input,
        KeyCode::KeyT,
        KeyCode::KeyG,
        &mut params.tessellation_amount,
        TESSELLATION_STEP,
        DemoConfig::MAX_TESSELLATION_AMOUNT,
    );
    changed |= step(
        input,
        KeyCode::KeyY,
        KeyCode::KeyH,
        &mut params.height_scale,
        HEIGHT_STEP,
        DemoConfig::MAX_HEIGHT_PARAM,
    );
    changed |= step(
        input,
        KeyCode::KeyU,
        KeyCode::KeyJ,
        &mut params.height_bias,
        HEIGHT_STEP,
        DemoConfig::MAX_HEIGHT_PARAM,
    );

    if changed {
        log::info!(
            "fill {:?}, tessellation {:.0}, height scale {:.1}, height bias {:.1}",
            params.fill_mode,
            params.tessellation_amount,
            params.height_scale,
            params.height_bias
        );
    }
    changed
}

#[cfg(test)]
mod tests {
    use crate::pipelines::state::FillMode;

    use super::*;

    fn params() -> RenderParams {
        RenderParams {
            clear_colour: [0.0; 4],
            fill_mode: FillMode::Solid,
            tessellation_amount: 10.0,
            height_scale: 0.5,
            height_bias: 1.0,
        }
    }

    fn press(keys: &[KeyCode]) -> InputState {
        let mut input = InputState::new();
        for key in keys {
            input.key_down(*key);
        }
        input
    }

    #[test]
    fn f_toggles_only_the_fill_mode() {
        let mut p = params();
        assert!(apply_controls(&mut p, &press(&[KeyCode::KeyF])));
        assert_eq!(p, RenderParams { fill_mode: FillMode::Wireframe, ..params() });
    }

    #[test]
    fn steps_parameters_within_their_ranges() {
        let mut p = params();
        apply_controls(&mut p, &press(&[KeyCode::KeyT, KeyCode::KeyY, KeyCode::KeyJ]));
        assert_eq!(p.tessellation_amount, 11.0);
        assert!((p.height_scale - 0.6).abs() < 1e-6);
        assert!((p.height_bias - 0.9).abs() < 1e-6);

        p.tessellation_amount = 50.0;
        p.height_bias = 0.05;
        assert!(apply_controls(&mut p, &press(&[KeyCode::KeyT, KeyCode::KeyJ])));
        assert_eq!(p.tessellation_amount, 50.0);
        assert_eq!(p.height_bias, 0.0);

        assert!(!apply_controls(&mut p, &press(&[KeyCode::KeyT])));
    }

    #[test]
    fn opposite_keys_cancel_out() {
        let mut p = params();
        assert!(!apply_controls(&mut p, &press(&[KeyCode::KeyT, KeyCode::KeyG])));
        assert_eq!(p, params());
    }
}
