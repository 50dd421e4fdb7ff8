/// Selection state for the song list of one show. Only indices are kept; the
/// songs themselves are read from the library on every draw so nothing goes
/// stale after an edit.
pub(crate) struct ShowScreen {
    pub(crate) show_index: usize,
    pub(crate) selected: usize,
}

impl ShowScreen {
    pub(crate) fn new(show_index: usize, selected: usize) -> Self {
        Self {
            show_index,
            selected,
        }
    }

    pub(crate) fn move_selection(&mut self, offset: isize, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        let last = len as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self, len: usize) {
        self.selected = len.saturating_sub(1);
    }

    pub(crate) fn ensure_in_bounds(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_clamped_to_list() {
        let mut screen = ShowScreen::new(0, 0);
        screen.move_selection(-3, 4);
        assert_eq!(screen.selected, 0);
        screen.move_selection(10, 4);
        assert_eq!(screen.selected, 3);
        screen.ensure_in_bounds(2);
        assert_eq!(screen.selected, 1);
        screen.move_selection(1, 0);
        assert_eq!(screen.selected, 0);
    }
}
