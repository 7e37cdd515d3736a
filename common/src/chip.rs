use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipColor {
    Neutral,
    Info,
    Progress,
    Warning,
    Success,
    Danger,
}

impl ChipColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChipColor::Neutral => "neutral",
            ChipColor::Info => "info",
            ChipColor::Progress => "progress",
            ChipColor::Warning => "warning",
            ChipColor::Success => "success",
            ChipColor::Danger => "danger",
        }
    }

    /// Código ANSI para pintar el chip en terminal.
    pub fn ansi(&self) -> &'static str {
        match self {
            ChipColor::Neutral => "\x1b[37m",
            ChipColor::Info => "\x1b[36m",
            ChipColor::Progress => "\x1b[34m",
            ChipColor::Warning => "\x1b[33m",
            ChipColor::Success => "\x1b[32m",
            ChipColor::Danger => "\x1b[31m",
        }
    }
}

/// Etiqueta + color que se muestra para un status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChip {
    pub label: &'static str,
    pub color: ChipColor,
}

/// Fila de una tabla de etiquetas: (status en el wire, label, color).
pub type ChipRow = (&'static str, &'static str, ChipColor);

pub const UNKNOWN_CHIP: StatusChip = StatusChip {
    label: "Unknown",
    color: ChipColor::Neutral,
};

/// Busca el chip de `status` en `table`; si no está, devuelve el genérico.
pub fn lookup(table: &[ChipRow], status: &str) -> StatusChip {
    table
        .iter()
        .find(|(key, _, _)| *key == status)
        .map(|&(_, label, color)| StatusChip { label, color })
        .unwrap_or(UNKNOWN_CHIP)
}

impl std::fmt::Display for StatusChip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[ChipRow] = &[
        ("done", "Done", ChipColor::Success),
        ("oops", "Oops", ChipColor::Danger),
    ];

    #[test]
    fn lookup_encuentra_fila() {
        let chip = lookup(TABLE, "oops");
        assert_eq!(chip.label, "Oops");
        assert_eq!(chip.color, ChipColor::Danger);
    }

    #[test]
    fn lookup_cae_al_chip_generico() {
        assert_eq!(lookup(TABLE, "unknown_future_status"), UNKNOWN_CHIP);
        assert_eq!(lookup(&[], ""), UNKNOWN_CHIP);
    }
}
