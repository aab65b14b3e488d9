//! The page chrome drawn over the 3D view: loading indicator, header, hero
//! text and the content section further down the virtual page.

use imgui::{Condition, StyleVar, WindowFlags};

use crate::{asset_loader::LoadProgress, config::RevealConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Loader,
    Header,
    NewDrop,
    Content,
}

impl Element {
    const ALL: [Element; 4] = [
        Element::Loader,
        Element::Header,
        Element::NewDrop,
        Element::Content,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleProperty {
    Opacity,
    /// Vertical offset in logical pixels.
    OffsetY,
    /// Vertical offset as a percentage of the element's own height.
    OffsetYPercent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementStyle {
    pub opacity: f32,
    pub offset_y: f32,
    pub offset_y_percent: f32,
}

impl ElementStyle {
    const VISIBLE: ElementStyle = ElementStyle {
        opacity: 1.0,
        offset_y: 0.0,
        offset_y_percent: 0.0,
    };

    pub fn set(&mut self, property: StyleProperty, value: f32) {
        match property {
            StyleProperty::Opacity => self.opacity = value,
            StyleProperty::OffsetY => self.offset_y = value,
            StyleProperty::OffsetYPercent => self.offset_y_percent = value,
        }
    }

    fn is_hidden(&self) -> bool {
        self.opacity <= 0.0 || self.offset_y_percent <= -100.0
    }
}

pub struct Overlay {
    styles: [ElementStyle; Element::ALL.len()],
    loader_text: String,
    viewport_width: f32,
    viewport_height: f32,
    content_in_view: bool,
}

impl Overlay {
    pub fn new(reveal: &RevealConfig) -> Self {
        let slid_out = ElementStyle {
            opacity: 0.0,
            offset_y: reveal.slide_offset,
            offset_y_percent: 0.0,
        };

        let mut styles = [ElementStyle::VISIBLE; Element::ALL.len()];
        styles[Element::Header.index()] = slid_out;
        styles[Element::NewDrop.index()] = slid_out;
        styles[Element::Content.index()].opacity = 0.0;

        Self {
            styles,
            loader_text: "0%".to_string(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            content_in_view: false,
        }
    }

    pub fn style(&self, element: Element) -> &ElementStyle {
        &self.styles[element.index()]
    }

    pub fn set_style(&mut self, element: Element, property: StyleProperty, value: f32) {
        self.styles[element.index()].set(property, value);
    }

    pub fn set_progress(&mut self, progress: LoadProgress) {
        if let Some(percent) = progress.percent() {
            self.loader_text = format!("{percent}%");
        }
    }

    #[cfg(test)]
    pub fn loader_text(&self) -> &str {
        &self.loader_text
    }

    /// Logical viewport size. The page is two viewports tall: the hero
    /// section with the model, then the content section.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn max_scroll(&self) -> f32 {
        self.page_height() - self.viewport_height
    }

    fn page_height(&self) -> f32 {
        self.viewport_height * 2.0
    }

    fn content_top(&self) -> f32 {
        self.viewport_height
    }

    fn content_bottom(&self) -> f32 {
        self.page_height()
    }

    /// Tracks the content section against the viewport. Returns true on the
    /// frame it comes into view.
    pub fn update_in_view(&mut self, scroll_y: f32) -> bool {
        let in_view = self.content_top() - scroll_y < self.viewport_height
            && self.content_bottom() - scroll_y > 0.0;
        let entered = in_view && !self.content_in_view;
        self.content_in_view = in_view;
        entered
    }

    pub fn draw(&self, ui: &imgui::Ui, scroll_y: f32) {
        let flags = WindowFlags::NO_DECORATION
            | WindowFlags::NO_MOVE
            | WindowFlags::NO_INPUTS
            | WindowFlags::NO_SAVED_SETTINGS
            | WindowFlags::NO_FOCUS_ON_APPEARING
            | WindowFlags::NO_NAV;
        let (width, height) = (self.viewport_width, self.viewport_height);

        self.draw_element(ui, Element::NewDrop, flags, |style| {
            ([width * 0.08, height * 0.62 - scroll_y + style.offset_y], [width * 0.5, 0.0])
        }, |ui| {
            ui.set_window_font_scale(1.2);
            ui.text("NEW DROP");
            ui.set_window_font_scale(3.0);
            ui.text("Runner 01");
            ui.set_window_font_scale(1.0);
            ui.text_wrapped("Scroll to spin it. Drag to look around.");
        });

        self.draw_element(ui, Element::Content, flags, |_| {
            (
                [width * 0.15, self.content_top() - scroll_y + height * 0.15],
                [width * 0.7, 0.0],
            )
        }, |ui| {
            ui.set_window_font_scale(1.6);
            ui.text("Built to move");
            ui.set_window_font_scale(1.0);
            ui.separator();
            ui.text_wrapped(
                "A knit upper that breathes, a foam midsole that gives back what you put in, \
                 and an outsole tuned for city streets.",
            );
            ui.spacing();
            ui.text_wrapped("Limited run. Available while stocks last.");
        });

        self.draw_element(ui, Element::Header, flags, |style| {
            ([0.0, style.offset_y], [width, 0.0])
        }, |ui| {
            ui.set_window_font_scale(1.4);
            ui.text("SNEAKERS");
            ui.set_window_font_scale(1.0);
            for item in ["Men", "Women", "Kids", "Sale"] {
                ui.same_line_with_spacing(0.0, 32.0);
                ui.text(item);
            }
        });

        // Last, so it covers everything until it slides away.
        self.draw_element(ui, Element::Loader, flags, |style| {
            ([0.0, height * style.offset_y_percent / 100.0], [width, height])
        }, |ui| {
            ui.set_window_font_scale(3.0);
            let text_size = ui.calc_text_size(&self.loader_text);
            ui.set_cursor_pos([
                (width - text_size[0]) * 0.5,
                (height - text_size[1]) * 0.5,
            ]);
            ui.text(&self.loader_text);
        });
    }

    fn draw_element(
        &self,
        ui: &imgui::Ui,
        element: Element,
        flags: WindowFlags,
        layout: impl FnOnce(&ElementStyle) -> ([f32; 2], [f32; 2]),
        contents: impl FnOnce(&imgui::Ui),
    ) {
        let style = self.style(element);
        if style.is_hidden() {
            return;
        }

        let (position, size) = layout(style);
        let _alpha = ui.push_style_var(StyleVar::Alpha(style.opacity.clamp(0.0, 1.0)));

        let mut window = ui
            .window(format!("##{element:?}"))
            .position(position, Condition::Always)
            .flags(flags);
        window = if size[1] > 0.0 {
            window.size(size, Condition::Always).bg_alpha(1.0)
        } else {
            window
                .size([size[0], 0.0], Condition::Always)
                .flags(flags | WindowFlags::ALWAYS_AUTO_RESIZE | WindowFlags::NO_BACKGROUND)
        };
        window.build(|| contents(ui));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShowcaseConfig;

    fn overlay() -> Overlay {
        let mut overlay = Overlay::new(&ShowcaseConfig::default().reveal);
        overlay.set_viewport(1280.0, 720.0);
        overlay
    }

    #[test]
    fn starts_with_only_the_loader_visible() {
        let overlay = overlay();
        assert!(!overlay.style(Element::Loader).is_hidden());
        assert!(overlay.style(Element::Header).is_hidden());
        assert!(overlay.style(Element::NewDrop).is_hidden());
        assert!(overlay.style(Element::Content).is_hidden());
        assert_eq!(overlay.style(Element::Header).offset_y, -100.0);
        assert_eq!(overlay.loader_text(), "0%");
    }

    #[test]
    fn progress_updates_loader_text_in_order() {
        let mut overlay = overlay();
        let mut shown = Vec::new();

        for loaded in [50, 100] {
            overlay.set_progress(LoadProgress { loaded, total: 100 });
            shown.push(overlay.loader_text().to_string());
        }

        assert_eq!(shown, vec!["50%", "100%"]);
    }

    #[test]
    fn unknown_total_keeps_previous_text() {
        let mut overlay = overlay();
        overlay.set_progress(LoadProgress {
            loaded: 30,
            total: 100,
        });
        overlay.set_progress(LoadProgress {
            loaded: 40,
            total: 0,
        });
        assert_eq!(overlay.loader_text(), "30%");
    }

    #[test]
    fn loader_hides_once_slid_out() {
        let mut overlay = overlay();
        overlay.set_style(Element::Loader, StyleProperty::OffsetYPercent, -50.0);
        assert!(!overlay.style(Element::Loader).is_hidden());
        overlay.set_style(Element::Loader, StyleProperty::OffsetYPercent, -100.0);
        assert!(overlay.style(Element::Loader).is_hidden());
    }

    #[test]
    fn content_enters_view_once_per_visit() {
        let mut overlay = overlay();
        assert_eq!(overlay.max_scroll(), 720.0);

        assert!(!overlay.update_in_view(0.0));
        assert!(overlay.update_in_view(1.0));
        assert!(!overlay.update_in_view(300.0));

        assert!(!overlay.update_in_view(0.0));
        assert!(overlay.update_in_view(10.0));
    }
}
