//! The two-valued color tag shared by the controller and pool layers.

/// Which side of the board a mover occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Black,
    White,
}

impl Side {
    /// The other side. An involution: `side.flip().flip() == side`.
    pub fn flip(self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_is_an_involution() {
        assert_eq!(Side::Black.flip(), Side::White);
        assert_eq!(Side::White.flip(), Side::Black);
        assert_eq!(Side::Black.flip().flip(), Side::Black);
    }
}
