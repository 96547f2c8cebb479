use crate::types::{Button, ButtonEvent, ViveButtons};

/// Vive controller USB button bits, in event order.
pub const VIVE_CONTROLLER_BUTTON_MAP: [(u32, Button); 6] = [
    (ViveButtons::TRIGGER.bits(), Button::Trigger),
    (ViveButtons::GRIP.bits(), Button::Grip),
    (ViveButtons::MENU.bits(), Button::Menu),
    (ViveButtons::SYSTEM.bits(), Button::System),
    (ViveButtons::THUMB.bits(), Button::Thumb),
    (ViveButtons::TOUCH.bits(), Button::ThumbTouch),
];

/// Press/release events for every mapped bit that differs, in map order.
pub fn button_edges(buttons: u32, previous: u32, map: &[(u32, Button)]) -> Vec<ButtonEvent> {
    let changed = buttons ^ previous;
    map.iter()
        .filter(|(bit, _)| changed & bit != 0)
        .map(|&(bit, button)| ButtonEvent {
            button,
            pressed: buttons & bit != 0,
        })
        .collect()
}

/// Last-seen button state of one device.
#[derive(Debug, Clone)]
pub struct ButtonState {
    buttons: u32,
    map: &'static [(u32, Button)],
}

impl ButtonState {
    pub fn new(map: &'static [(u32, Button)]) -> Self {
        Self { buttons: 0, map }
    }

    pub fn buttons(&self) -> u32 {
        self.buttons
    }

    /// Records a new snapshot and returns the resulting edges.
    pub fn update(&mut self, buttons: u32) -> Vec<ButtonEvent> {
        if buttons == self.buttons {
            return Vec::new();
        }
        let events = button_edges(buttons, self.buttons, self.map);
        self.buttons = buttons;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_press() {
        let mut state = ButtonState::new(&VIVE_CONTROLLER_BUTTON_MAP);
        assert_eq!(
            state.update(0b000001),
            vec![ButtonEvent {
                button: Button::Trigger,
                pressed: true
            }]
        );
        assert!(state.update(0b000001).is_empty());
    }

    #[test]
    fn test_release_and_press_in_map_order() {
        let previous = ViveButtons::MENU | ViveButtons::GRIP;
        let now = ViveButtons::TOUCH | ViveButtons::GRIP | ViveButtons::TRIGGER;
        let events = button_edges(now.bits(), previous.bits(), &VIVE_CONTROLLER_BUTTON_MAP);
        assert_eq!(
            events,
            vec![
                ButtonEvent {
                    button: Button::Trigger,
                    pressed: true
                },
                ButtonEvent {
                    button: Button::Menu,
                    pressed: false
                },
                ButtonEvent {
                    button: Button::ThumbTouch,
                    pressed: true
                },
            ]
        );
    }

    #[test]
    fn test_unmapped_bits_are_ignored() {
        let mut state = ButtonState::new(&VIVE_CONTROLLER_BUTTON_MAP);
        assert!(state.update(1 << 1).is_empty());
        assert_eq!(state.buttons(), 1 << 1);
    }
}
