//! Static key code tables.
//!
//! Native key codes are sparse (0..323 with gaps), so decoded key events carry
//! a compact symbolic index instead: the position of the native code among
//! all codes the video library defines. Index 0 is the unknown key.

/// Size of the native key code space.
pub const NATIVE_KEY_COUNT: usize = 323;

/// Symbolic index reported for codes with no defined key.
pub const UNKNOWN_KEY: u16 = 0;

/// Inclusive runs of defined native key codes.
const DEFINED_RANGES: [(u16, u16); 11] = [
    (0, 0),     // unknown
    (8, 9),     // backspace, tab
    (12, 13),   // clear, return
    (19, 19),   // pause
    (27, 27),   // escape
    (32, 36),   // space ! " # $
    (38, 64),   // & ' ( ) * + , - . / 0-9 : ; < = > ? @
    (91, 122),  // [ \ ] ^ _ ` a-z
    (127, 127), // delete
    (160, 296), // world keys, keypad, arrows and navigation, F1-F15
    (300, 322), // lock and modifier keys, compose, help .. undo
];

/// Number of defined keys, including the unknown key.
pub const SYMBOLIC_KEY_COUNT: usize = count_defined();

const fn count_defined() -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < DEFINED_RANGES.len() {
        let (first, last) = DEFINED_RANGES[i];
        total += (last - first) as usize + 1;
        i += 1;
    }
    total
}

const fn build_symbolic_to_native() -> [u16; SYMBOLIC_KEY_COUNT] {
    let mut table = [0u16; SYMBOLIC_KEY_COUNT];
    let mut next = 0;
    let mut i = 0;
    while i < DEFINED_RANGES.len() {
        let (first, last) = DEFINED_RANGES[i];
        let mut code = first;
        while code <= last {
            table[next] = code;
            next += 1;
            code += 1;
        }
        i += 1;
    }
    table
}

const fn build_native_to_symbolic() -> [u16; NATIVE_KEY_COUNT] {
    let inverse = build_symbolic_to_native();
    let mut table = [UNKNOWN_KEY; NATIVE_KEY_COUNT];
    let mut index = 0;
    while index < SYMBOLIC_KEY_COUNT {
        table[inverse[index] as usize] = index as u16;
        index += 1;
    }
    table
}

static SYMBOLIC_TO_NATIVE: [u16; SYMBOLIC_KEY_COUNT] = build_symbolic_to_native();
static NATIVE_TO_SYMBOLIC: [u16; NATIVE_KEY_COUNT] = build_native_to_symbolic();

/// Maps a native key code to its symbolic index. Undefined and out-of-range
/// codes map to [`UNKNOWN_KEY`].
pub fn symbolic_from_native(code: u32) -> u16 {
    usize::try_from(code)
        .ok()
        .and_then(|code| NATIVE_TO_SYMBOLIC.get(code))
        .copied()
        .unwrap_or(UNKNOWN_KEY)
}

/// Maps a symbolic index back to its native key code. Indices past the table
/// map to the native unknown code, 0.
pub fn native_from_symbolic(index: u16) -> u32 {
    SYMBOLIC_TO_NATIVE
        .get(usize::from(index))
        .copied()
        .map(u32::from)
        .unwrap_or(0)
}
