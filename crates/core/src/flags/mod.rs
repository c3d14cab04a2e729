//! Symbolic capability sets and their native bitmask encoding.
//!
//! Each configuration context (subsystem init, video mode, keyboard
//! modifiers, application state) owns a static table pairing every tag with
//! exactly one native bit. Tables are listed in ascending bit order, which is
//! also the order [`FlagContext::decode`] yields tags in.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// One row of a context table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagBit<T: 'static> {
    pub tag: T,
    pub bit: u32,
    pub name: &'static str,
}

/// A configuration context with a fixed tag <-> bit table.
pub trait FlagContext {
    type Tag: Copy + Eq + fmt::Debug + 'static;

    /// Human readable context name, used in logs.
    const NAME: &'static str;
    const TABLE: &'static [FlagBit<Self::Tag>];

    /// Collects every tag whose bit is set in `mask`. Bits with no tag are
    /// dropped.
    fn decode(mask: u32) -> FlagSet<Self::Tag> {
        Self::TABLE
            .iter()
            .filter(|row| mask & row.bit != 0)
            .map(|row| row.tag)
            .collect()
    }

    /// ORs together the native bits of the given tags.
    fn encode<I>(flags: I) -> u32
    where
        I: IntoIterator,
        I::Item: Borrow<Self::Tag>,
    {
        flags
            .into_iter()
            .filter_map(|tag| Self::bit(*tag.borrow()))
            .fold(0, |mask, bit| mask | bit)
    }

    fn bit(tag: Self::Tag) -> Option<u32> {
        Self::TABLE.iter().find(|row| row.tag == tag).map(|row| row.bit)
    }

    fn name(tag: Self::Tag) -> Option<&'static str> {
        Self::TABLE
            .iter()
            .find(|row| row.tag == tag)
            .map(|row| row.name)
    }

    fn by_name(name: &str) -> Option<Self::Tag> {
        Self::TABLE
            .iter()
            .find(|row| row.name.eq_ignore_ascii_case(name))
            .map(|row| row.tag)
    }

    /// Union of every bit the table knows about.
    fn known_bits() -> u32 {
        Self::TABLE.iter().fold(0, |mask, row| mask | row.bit)
    }
}

/// Ordered set of tags. Iteration follows insertion order; duplicates are
/// ignored on insert.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagSet<T> {
    tags: Vec<T>,
}

impl<T: Copy + Eq> FlagSet<T> {
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Adds `tag` unless already present. Returns whether it was added.
    pub fn insert(&mut self, tag: T) -> bool {
        if self.contains(tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn remove(&mut self, tag: T) -> bool {
        let before = self.tags.len();
        self.tags.retain(|existing| *existing != tag);
        before != self.tags.len()
    }

    pub fn contains(&self, tag: T) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_superset(&self, other: &FlagSet<T>) -> bool {
        other.tags.iter().all(|tag| self.contains(*tag))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.tags.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<T: Copy + Eq> Default for FlagSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for FlagSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tags.iter()).finish()
    }
}

impl<T: Copy + Eq> FromIterator<T> for FlagSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl<T: Copy + Eq> Extend<T> for FlagSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for tag in iter {
            self.insert(tag);
        }
    }
}

impl<'a, T> IntoIterator for &'a FlagSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

macro_rules! flag_context {
    (
        $(#[$ctx_meta:meta])*
        $ctx:ident as $label:literal;
        $(#[$tag_meta:meta])*
        $tag:ident {
            $( $(#[$var_meta:meta])* $variant:ident = $bit:literal => $name:literal, )+
        }
    ) => {
        $(#[$tag_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $tag {
            $(
                $(#[$var_meta])*
                #[serde(rename = $name)]
                $variant,
            )+
        }

        $(#[$ctx_meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ctx;

        impl FlagContext for $ctx {
            type Tag = $tag;

            const NAME: &'static str = $label;
            const TABLE: &'static [FlagBit<$tag>] = &[
                $( FlagBit { tag: $tag::$variant, bit: $bit, name: $name }, )+
            ];
        }
    };
}

flag_context! {
    /// Subsystem initialisation flags.
    InitContext as "init";
    InitFlag {
        Timer = 0x0000_0001 => "timer",
        Audio = 0x0000_0010 => "audio",
        Video = 0x0000_0020 => "video",
        CdRom = 0x0000_0100 => "cd-rom",
        Joystick = 0x0000_0200 => "joystick",
        /// Skip installing the fatal signal handlers.
        NoParachute = 0x0010_0000 => "no-parachute",
        EventThread = 0x0100_0000 => "event-thread",
    }
}

flag_context! {
    /// Video mode and surface flags. The zero-valued software-surface flag and
    /// the composite OpenGL blit flag have no single bit and are left out.
    VideoContext as "video";
    VideoFlag {
        HardwareSurface = 0x0000_0001 => "hardware-surface",
        OpenGl = 0x0000_0002 => "open-gl",
        AsyncBlit = 0x0000_0004 => "async-blit",
        Resizable = 0x0000_0010 => "resizable",
        NoFrame = 0x0000_0020 => "no-frame",
        HardwareAccelerated = 0x0000_0100 => "hardware-accelerated",
        SourceColorKey = 0x0000_1000 => "source-color-key",
        RleAccelerated = 0x0000_4000 => "rle-accelerated",
        SourceAlpha = 0x0001_0000 => "source-alpha",
        Preallocated = 0x0100_0000 => "preallocated",
        AnyFormat = 0x1000_0000 => "any-format",
        HardwarePalette = 0x2000_0000 => "hardware-palette",
        DoubleBuffered = 0x4000_0000 => "double-buffered",
        FullScreen = 0x8000_0000 => "full-screen",
    }
}

flag_context! {
    /// Keyboard modifier state.
    KeyModContext as "key-mod";
    KeyMod {
        LeftShift = 0x0001 => "left-shift",
        RightShift = 0x0002 => "right-shift",
        LeftCtrl = 0x0040 => "left-ctrl",
        RightCtrl = 0x0080 => "right-ctrl",
        LeftAlt = 0x0100 => "left-alt",
        RightAlt = 0x0200 => "right-alt",
        LeftMeta = 0x0400 => "left-meta",
        RightMeta = 0x0800 => "right-meta",
        NumLock = 0x1000 => "num-lock",
        CapsLock = 0x2000 => "caps-lock",
        Mode = 0x4000 => "mode",
        Reserved = 0x8000 => "reserved",
    }
}

flag_context! {
    /// Application focus and visibility state.
    AppStateContext as "app-state";
    AppState {
        MouseFocus = 0x01 => "mouse-focus",
        InputFocus = 0x02 => "input-focus",
        /// The application is visible (not iconified).
        Active = 0x04 => "active",
    }
}

/// Runtime selector over the four contexts, for callers working with tag
/// names rather than typed tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Context {
    Init,
    Video,
    KeyMod,
    AppState,
}

impl Context {
    pub const ALL: [Context; 4] = [
        Context::Init,
        Context::Video,
        Context::KeyMod,
        Context::AppState,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Context::Init => InitContext::NAME,
            Context::Video => VideoContext::NAME,
            Context::KeyMod => KeyModContext::NAME,
            Context::AppState => AppStateContext::NAME,
        }
    }

    /// Names of the tags set in `mask`, in ascending bit order.
    pub fn decode_names(self, mask: u32) -> Vec<&'static str> {
        match self {
            Context::Init => names_in::<InitContext>(mask),
            Context::Video => names_in::<VideoContext>(mask),
            Context::KeyMod => names_in::<KeyModContext>(mask),
            Context::AppState => names_in::<AppStateContext>(mask),
        }
    }

    /// Encodes tags given by name. Names the context does not know are
    /// skipped.
    pub fn encode_names<I>(self, names: I) -> u32
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        match self {
            Context::Init => encode_names_in::<InitContext, _>(names),
            Context::Video => encode_names_in::<VideoContext, _>(names),
            Context::KeyMod => encode_names_in::<KeyModContext, _>(names),
            Context::AppState => encode_names_in::<AppStateContext, _>(names),
        }
    }

    pub fn known_bits(self) -> u32 {
        match self {
            Context::Init => InitContext::known_bits(),
            Context::Video => VideoContext::known_bits(),
            Context::KeyMod => KeyModContext::known_bits(),
            Context::AppState => AppStateContext::known_bits(),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn names_in<C: FlagContext>(mask: u32) -> Vec<&'static str> {
    C::TABLE
        .iter()
        .filter(|row| mask & row.bit != 0)
        .map(|row| row.name)
        .collect()
}

fn encode_names_in<C, I>(names: I) -> u32
where
    C: FlagContext,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut mask = 0;
    for name in names {
        let name = name.as_ref();
        match C::by_name(name).and_then(C::bit) {
            Some(bit) => mask |= bit,
            None => tracing::warn!(context = C::NAME, name, "ignoring unknown flag name"),
        }
    }
    mask
}
