use crate::controller::PhoneInputController;
use crate::country::CountryCode;
use crate::error::Result;

/// Country selection list presented to the user.
pub trait PickerSurface {
    /// Move the picker cursor to `code` before it is shown.
    fn preselect(&mut self, code: &CountryCode);

    fn show(&mut self);
}

/// Text field the phone number is typed into.
pub trait TextEntrySurface {
    fn focus(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagActivation {
    /// The field is disabled.
    Ignored,
    /// A caller-supplied handler took over.
    Overridden,
    PickerShown,
}

/// Routes flag presses and picker choices to the controller.
#[derive(Default)]
pub struct SelectionBridge {
    flag_override: Option<Box<dyn FnMut()>>,
}

impl SelectionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default "open the picker" behavior of a flag press.
    pub fn with_flag_override<F>(mut self, handler: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.flag_override = Some(Box::new(handler));
        self
    }

    pub fn on_flag_activated(
        &mut self,
        controller: &PhoneInputController,
        picker: &mut dyn PickerSurface,
    ) -> FlagActivation {
        if controller.is_disabled() {
            return FlagActivation::Ignored;
        }

        if let Some(handler) = self.flag_override.as_mut() {
            handler();
            return FlagActivation::Overridden;
        }

        if let Some(code) = controller.selected_country() {
            picker.preselect(code);
        }
        picker.show();
        FlagActivation::PickerShown
    }

    pub fn on_country_chosen(&mut self, controller: &mut PhoneInputController, code: &str) -> Result<()> {
        controller.select_country(code)
    }

    pub fn focus(&mut self, surface: &mut dyn TextEntrySurface) {
        surface.focus();
    }
}
