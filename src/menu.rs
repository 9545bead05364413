/// Entries of the right-click context menu
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuCommand {
    HowToPlay,
    IncreaseMass,
    DecreaseMass,
    About,
}

impl MenuCommand {
    pub const ALL: [MenuCommand; 4] = [
        MenuCommand::HowToPlay,
        MenuCommand::IncreaseMass,
        MenuCommand::DecreaseMass,
        MenuCommand::About,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuCommand::HowToPlay => "How to Play",
            MenuCommand::IncreaseMass => "Increase Sphere Mass",
            MenuCommand::DecreaseMass => "Decrease Sphere Mass",
            MenuCommand::About => "About",
        }
    }
}

/// Applies a mass command; decreases are floor-clamped at zero
pub fn adjust_mass(mass: f64, command: MenuCommand) -> f64 {
    match command {
        MenuCommand::IncreaseMass => mass + 1.0,
        MenuCommand::DecreaseMass => (mass - 1.0).max(0.0),
        MenuCommand::HowToPlay | MenuCommand::About => mass,
    }
}

pub const HOW_TO_PLAY: &[&str] = &[
    "Move the stylus: arrows (X/Y), PageUp/PageDown (Z), [ ] twist, < > tilt",
    "Toggle the primary button (space) or secondary (b) near the ball to grab it",
    "Carry the ball to a cube face to feel the wall; gravity grows with mass",
    "Left drag rotates the view, middle drag zooms, right click opens this menu",
    "+/- change the mass, m opens the menu, d debug, r resets the view, q quits",
];

/// Popup opened with a right click, anchored at the click position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextMenu {
    pub column: u16,
    pub row: u16,
    pub selected: usize,
}

impl ContextMenu {
    pub fn open(column: u16, row: u16) -> Self {
        ContextMenu {
            column,
            row,
            selected: 0,
        }
    }

    pub fn width() -> u16 {
        MenuCommand::ALL
            .iter()
            .map(|command| command.label().len() as u16 + 2)
            .max()
            .unwrap_or(0)
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % MenuCommand::ALL.len();
    }

    pub fn select_previous(&mut self) {
        self.selected = (self.selected + MenuCommand::ALL.len() - 1) % MenuCommand::ALL.len();
    }

    pub fn current(&self) -> MenuCommand {
        MenuCommand::ALL[self.selected]
    }

    /// The entry under a mouse click, if the click landed on the menu
    pub fn hit(&self, column: u16, row: u16) -> Option<MenuCommand> {
        if column < self.column || column >= self.column + Self::width() || row < self.row {
            return None;
        }
        MenuCommand::ALL.get((row - self.row) as usize).copied()
    }
}
