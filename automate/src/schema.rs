//! Action schema registry
//!
//! The fixed catalog of action kinds and the typed fields each one carries.
//! Every other component consults this table: record creation seeds defaults
//! from it, program lowering parses field literals by their declared kind, and
//! front ends render one input per declared field.

use crate::errors::WorkflowError;
use std::fmt;
use std::str::FromStr;

/// One of the fixed automation step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    MoveTo,
    Click,
    DragTo,
    Scroll,
    WriteText,
    PressKey,
    Hotkey,
    Wait,
    LoopStart,
    LoopEnd,
    FindAndClickImage,
    Screenshot,
    Comment,
}

impl ActionKind {
    /// Every kind, in toolbox order.
    pub const ALL: [ActionKind; 13] = [
        ActionKind::MoveTo,
        ActionKind::Click,
        ActionKind::DragTo,
        ActionKind::Scroll,
        ActionKind::WriteText,
        ActionKind::PressKey,
        ActionKind::Hotkey,
        ActionKind::Wait,
        ActionKind::LoopStart,
        ActionKind::LoopEnd,
        ActionKind::FindAndClickImage,
        ActionKind::Screenshot,
        ActionKind::Comment,
    ];

    /// The display name, which is also the persisted `type` string.
    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn schema(self) -> &'static ActionSchema {
        &SCHEMAS[self as usize]
    }

    pub fn fields(self) -> &'static [FieldDecl] {
        self.schema().fields
    }

    pub fn is_loop_marker(self) -> bool {
        matches!(self, ActionKind::LoopStart | ActionKind::LoopEnd)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SCHEMAS
            .iter()
            .find(|schema| schema.name == s)
            .map(|schema| schema.kind)
            .ok_or_else(|| WorkflowError::UnknownActionKind(s.to_string()))
    }
}

/// Declared type of a field. Values are always stored as strings; the kind
/// decides how they are embedded in scripts and parsed for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    String,
    FilePath,
}

impl FieldKind {
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Integer => "int",
            FieldKind::Float => "float",
            FieldKind::String => "str",
            FieldKind::FilePath => "file",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Float)
    }
}

/// A named, typed input that an action kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: &'static str,
}

impl FieldDecl {
    const fn new(name: &'static str, kind: FieldKind, default: &'static str) -> Self {
        Self {
            name,
            kind,
            default,
        }
    }
}

/// Toolbox grouping used by front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Mouse,
    Keyboard,
    LogicAndFlow,
    ComputerVision,
    System,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Mouse,
        Category::Keyboard,
        Category::LogicAndFlow,
        Category::ComputerVision,
        Category::System,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Category::Mouse => "Mouse",
            Category::Keyboard => "Keyboard",
            Category::LogicAndFlow => "Logic & Flow",
            Category::ComputerVision => "Computer Vision",
            Category::System => "System",
        }
    }
}

/// Schema entry for one action kind: its fields plus presentation metadata.
#[derive(Debug)]
pub struct ActionSchema {
    pub kind: ActionKind,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub category: Category,
    pub fields: &'static [FieldDecl],
    /// Nesting change applied by this kind: +1 opens a loop, -1 closes one.
    pub indent_change: i8,
}

impl ActionSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Kinds that declare both `x` and `y` get a coordinate picker.
    pub fn has_coordinates(&self) -> bool {
        self.field("x").is_some() && self.field("y").is_some()
    }
}

use FieldKind::{FilePath, Float, Integer, String as Str};

const MOUSE_COLOR: &str = "#2980b9";
const KEYBOARD_COLOR: &str = "#27ae60";
const LOOP_COLOR: &str = "#8e44ad";

// Indexed by `ActionKind as usize`; keep in the same order as the enum.
static SCHEMAS: [ActionSchema; 13] = [
    ActionSchema {
        kind: ActionKind::MoveTo,
        name: "Move To",
        icon: "↗",
        color: MOUSE_COLOR,
        category: Category::Mouse,
        fields: &[
            FieldDecl::new("x", Integer, "0"),
            FieldDecl::new("y", Integer, "0"),
            FieldDecl::new("duration", Float, "0.5"),
        ],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::Click,
        name: "Click",
        icon: "🖱️",
        color: MOUSE_COLOR,
        category: Category::Mouse,
        fields: &[
            FieldDecl::new("x", Integer, "0"),
            FieldDecl::new("y", Integer, "0"),
            FieldDecl::new("clicks", Integer, "1"),
            FieldDecl::new("button", Str, "left"),
        ],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::DragTo,
        name: "Drag To",
        icon: "✊",
        color: MOUSE_COLOR,
        category: Category::Mouse,
        fields: &[
            FieldDecl::new("x", Integer, "0"),
            FieldDecl::new("y", Integer, "0"),
            FieldDecl::new("duration", Float, "1.0"),
        ],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::Scroll,
        name: "Scroll",
        icon: "↕",
        color: MOUSE_COLOR,
        category: Category::Mouse,
        fields: &[FieldDecl::new("amount", Integer, "-500")],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::WriteText,
        name: "Write Text",
        icon: "✎",
        color: KEYBOARD_COLOR,
        category: Category::Keyboard,
        fields: &[
            FieldDecl::new("text", Str, "Hello World"),
            FieldDecl::new("interval", Float, "0.05"),
        ],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::PressKey,
        name: "Press Key",
        icon: "⌨️",
        color: KEYBOARD_COLOR,
        category: Category::Keyboard,
        fields: &[FieldDecl::new("key", Str, "enter")],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::Hotkey,
        name: "Hotkey",
        icon: "🎹",
        color: KEYBOARD_COLOR,
        category: Category::Keyboard,
        fields: &[FieldDecl::new("keys", Str, "ctrl, c")],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::Wait,
        name: "Wait",
        icon: "⏳",
        color: "#f39c12",
        category: Category::LogicAndFlow,
        fields: &[FieldDecl::new("seconds", Float, "1.0")],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::LoopStart,
        name: "Loop Start",
        icon: "🔄",
        color: LOOP_COLOR,
        category: Category::LogicAndFlow,
        fields: &[FieldDecl::new("iterations", Integer, "5")],
        indent_change: 1,
    },
    ActionSchema {
        kind: ActionKind::LoopEnd,
        name: "Loop End",
        icon: "⏹",
        color: LOOP_COLOR,
        category: Category::LogicAndFlow,
        fields: &[],
        indent_change: -1,
    },
    ActionSchema {
        kind: ActionKind::FindAndClickImage,
        name: "Find & Click Image",
        icon: "🖼️",
        color: "#d35400",
        category: Category::ComputerVision,
        fields: &[
            FieldDecl::new("image_path", FilePath, ""),
            FieldDecl::new("confidence", Float, "0.9"),
        ],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::Screenshot,
        name: "Screenshot",
        icon: "📷",
        color: "#7f8c8d",
        category: Category::System,
        fields: &[FieldDecl::new("filename", Str, "snap.png")],
        indent_change: 0,
    },
    ActionSchema {
        kind: ActionKind::Comment,
        name: "Comment",
        icon: "#",
        color: "#95a5a6",
        category: Category::System,
        fields: &[FieldDecl::new("note", Str, "Describe step here...")],
        indent_change: 0,
    },
];

/// Ordered field declarations for the kind named `kind`.
pub fn fields_for(kind: &str) -> Result<&'static [FieldDecl], WorkflowError> {
    Ok(kind.parse::<ActionKind>()?.fields())
}

pub fn exists(kind: &str) -> bool {
    kind.parse::<ActionKind>().is_ok()
}

/// Kinds grouped by toolbox category, in toolbox order.
pub fn by_category() -> Vec<(Category, Vec<ActionKind>)> {
    Category::ALL
        .iter()
        .map(|&category| {
            let kinds = ActionKind::ALL
                .iter()
                .copied()
                .filter(|kind| kind.schema().category == category)
                .collect();
            (category, kinds)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.schema().kind, kind);
        }
    }

    #[test]
    fn test_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.name().parse::<ActionKind>().unwrap(), kind);
            assert!(exists(kind.name()));
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(!exists("Teleport"));
        assert!(matches!(
            fields_for("Teleport"),
            Err(WorkflowError::UnknownActionKind(name)) if name == "Teleport"
        ));
        // names are matched exactly
        assert!(!exists("move to"));
    }

    #[test]
    fn test_fields_for_click() {
        let names: Vec<_> = fields_for("Click").unwrap().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["x", "y", "clicks", "button"]);
    }

    #[test]
    fn test_loop_markers_change_indent() {
        assert_eq!(ActionKind::LoopStart.schema().indent_change, 1);
        assert_eq!(ActionKind::LoopEnd.schema().indent_change, -1);
        assert!(ActionKind::LoopEnd.fields().is_empty());
        let others = ActionKind::ALL.iter().filter(|k| !k.is_loop_marker());
        for kind in others {
            assert_eq!(kind.schema().indent_change, 0, "{kind}");
        }
    }

    #[test]
    fn test_coordinate_picker_kinds() {
        let with_coords: Vec<_> = ActionKind::ALL
            .into_iter()
            .filter(|k| k.schema().has_coordinates())
            .collect();
        assert_eq!(
            with_coords,
            vec![ActionKind::MoveTo, ActionKind::Click, ActionKind::DragTo]
        );
    }

    #[test]
    fn test_every_kind_has_a_category() {
        let groups = by_category();
        let grouped: usize = groups.iter().map(|(_, kinds)| kinds.len()).sum();
        assert_eq!(grouped, ActionKind::ALL.len());
        let (category, kinds) = &groups[2];
        assert_eq!(category.title(), "Logic & Flow");
        assert_eq!(
            kinds,
            &vec![ActionKind::Wait, ActionKind::LoopStart, ActionKind::LoopEnd]
        );
    }
}
