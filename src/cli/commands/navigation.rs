//! Navigation stack display

use serde::Serialize;

use crate::cli::output::{OutputFormat, print_formatted};
use crate::state::{BackStacks, NavKey, Navigator};

#[derive(Serialize)]
struct TabStack {
    tab: NavKey,
    active: bool,
    stack: Vec<NavKey>,
}

#[derive(Serialize)]
struct StacksView {
    current_tab: NavKey,
    tabs: Vec<TabStack>,
}

fn view(stacks: &BackStacks<NavKey>) -> StacksView {
    let current = *stacks.current_tab();
    let tabs = NavKey::TOP_LEVEL
        .iter()
        .filter_map(|tab| {
            stacks.stack_for(tab).map(|stack| TabStack {
                tab: *tab,
                active: *tab == current,
                stack: stack.to_vec(),
            })
        })
        .collect();

    StacksView {
        current_tab: current,
        tabs,
    }
}

fn format_view(view: &StacksView) -> String {
    let mut lines = vec![format!("Current tab: {}", view.current_tab.title())];
    for tab in &view.tabs {
        let marker = if tab.active { ">>> " } else { "    " };
        let path: Vec<&str> = tab.stack.iter().map(NavKey::title).collect();
        lines.push(format!("{}{}: {}", marker, tab.tab.title(), path.join(" > ")));
    }
    lines.join("\n")
}

/// Print every visited tab with its back stack
pub fn print_stacks(navigator: &Navigator, format: OutputFormat) {
    let view = view(&navigator.snapshot());
    print_formatted(&view, format, format_view);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_view_lists_visited_tabs_in_bar_order() {
        let mut stacks = BackStacks::new(NavKey::ArticlesList);
        stacks.switch_top_level(NavKey::NewsList);
        stacks.push(NavKey::ArticleWeb);

        let text = format_view(&view(&stacks));
        assert_eq!(
            text,
            "Current tab: Search\n>>> Search: Search > Read\n    Saved: Saved"
        );
    }

    #[test]
    fn test_unvisited_tab_is_omitted() {
        let stacks = BackStacks::new(NavKey::NewsList);
        let view = view(&stacks);
        assert_eq!(view.tabs.len(), 1);
        assert_eq!(view.tabs[0].stack, vec![NavKey::NewsList]);
    }
}
