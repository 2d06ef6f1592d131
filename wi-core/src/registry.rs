use crate::{EventRegistry, View};
use std::collections::HashMap;

/// Builds a view from the trailing arguments of `window_new`.
pub type ViewFactory = Box<dyn Fn(&EventRegistry, &[String]) -> Box<dyn View> + Send>;

pub struct ViewRegistry {
    factories: HashMap<String, ViewFactory>,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, factory: ViewFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str, bus: &EventRegistry, args: &[String]) -> Option<Box<dyn View>> {
        self.factories.get(name).map(|f| f(bus, args))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn list_views(&self) -> Vec<&String> {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        names
    }
}

/// Register a view type whose constructor is `new(EventRegistry, &[String])`.
#[macro_export]
macro_rules! register_view {
    ($registry:expr, $name:expr, $view_type:ty) => {
        $registry.register(
            $name,
            Box::new(|bus, args| Box::new(<$view_type>::new(bus.clone(), args))),
        );
    };
}

/// Register a view type whose constructor is `new(&[String])`.
#[macro_export]
macro_rules! register_view_no_bus {
    ($registry:expr, $name:expr, $view_type:ty) => {
        $registry.register(
            $name,
            Box::new(|_bus, args| Box::new(<$view_type>::new(args))),
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Size;
    use ratatui::{buffer::Buffer, layout::Rect};

    struct Echo {
        title: String,
    }

    impl Echo {
        fn new(args: &[String]) -> Self {
            Self {
                title: args.join(" "),
            }
        }
    }

    impl View for Echo {
        fn title(&self) -> &str {
            &self.title
        }

        fn natural_size(&self) -> Size {
            Size::new(self.title.len() as u16, 1)
        }

        fn render(&mut self, _area: Rect, _buf: &mut Buffer) {}
    }

    #[test]
    fn test_create_passes_args() {
        let mut registry = ViewRegistry::new();
        register_view_no_bus!(registry, "echo", Echo);

        let bus = EventRegistry::new();
        let args = vec!["hello".to_string(), "there".to_string()];
        let view = registry.create("echo", &bus, &args).unwrap();
        assert_eq!(view.title(), "hello there");
        assert_eq!(view.natural_size(), Size::new(11, 1));
    }

    #[test]
    fn test_unknown_view() {
        let registry = ViewRegistry::new();
        assert!(registry.create("nope", &EventRegistry::new(), &[]).is_none());
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_list_is_sorted() {
        let mut registry = ViewRegistry::new();
        register_view_no_bus!(registry, "zeta", Echo);
        register_view_no_bus!(registry, "alpha", Echo);
        assert_eq!(registry.list_views(), vec!["alpha", "zeta"]);
    }
}
