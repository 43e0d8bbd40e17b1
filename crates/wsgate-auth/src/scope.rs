//! Capability bitmask to scope names

/// Scope name for each bit, lowest bit first
pub const SCOPES: [&str; 13] = [
	"clientes",
	"lojas",
	"ofertas",
	"produtos",
	"pontos",
	"private",
	"convenio",
	"giftcard",
	"cobranca",
	"basico",
	"sistema",
	"terceiros",
	"totem",
];

/// Space separated scope names for the set bits of `mask`.
///
/// Zero or negative masks have no scope. Bits above the table are ignored.
pub fn scope_names(mask: i64) -> String {
	if mask <= 0 {
		return String::new();
	}

	SCOPES
		.iter()
		.enumerate()
		.filter(|(bit, _)| mask & (1_i64 << bit) != 0)
		.map(|(_, name)| *name)
		.collect::<Vec<_>>()
		.join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_scope_names() {
		assert_eq!(scope_names(5), "clientes ofertas");
		assert_eq!(scope_names(1), "clientes");
		assert_eq!(scope_names(4096), "totem");
		assert_eq!(scope_names(0), "");
		assert_eq!(scope_names(-1), "");
		assert_eq!(scope_names(8192), "");
		assert_eq!(scope_names(8191).split(' ').count(), 13);
	}
}

// vim: ts=4
