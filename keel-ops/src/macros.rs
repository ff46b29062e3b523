//! # The `impl_operators!` macro
//!
//! The whole crate is generated from one table. Each row names an operator:
//!
//! ```rust,ignore
//! impl_operators! {
//!     0x00 Unreachable "unreachable" NoImm MVP,
//!     0x0c Br "br" BranchImm MVP,
//!     0xfd_000c V128Const "v128.const" V128Imm SIMD,
//!     // ...
//! }
//! ```
//!
//! Row fields, left to right:
//!
//! - The wire encoding as a `u32` key: a plain opcode byte, or
//!   `prefix << 16 | sub_opcode` for the `0xfc`/`0xfd`/`0xfe` spaces, whose
//!   sub-opcode travels as an unsigned LEB128.
//! - The `Opcode`/`Operator` variant identifier.
//! - The display name used by diagnostics and trap messages.
//! - The immediate shape (one of the `Imm` types).
//! - The gating [`crate::FeatureSet`] flag.
//!
//! From the table the macro derives the [`crate::Opcode`] enum (with
//! `name`, `feature`, and `from_u32`), the [`crate::Operator`] enum with
//! one immediate-carrying variant per row, and the symmetric
//! `decode_with`/`encode` driven by the shapes' `Imm` impls.
//! Nothing else in the engine lists operators; the validator's accepted
//! inventory is exactly this table.

macro_rules! impl_operators {
    ($($enc:literal $Variant:ident $name:literal $Imm:ident $feature:ident,)*) => {
        /// Solely the opcode of an operator, without its immediates.
        ///
        /// The discriminant is the wire-encoding key: the opcode byte, or
        /// `prefix << 16 | sub_opcode` for prefixed operator spaces.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Opcode {
            $(
                #[doc = concat!("The `", $name, "` operator.")]
                $Variant = $enc,
            )*
        }

        impl Opcode {
            /// Look an opcode up by its wire-encoding key.
            pub fn from_u32(raw: u32) -> Option<Self> {
                match raw {
                    $($enc => Some(Self::$Variant),)*
                    _ => None,
                }
            }

            /// The operator's display name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$Variant => $name,)*
                }
            }

            /// The feature flag gating this operator.
            pub const fn feature(self) -> $crate::FeatureSet {
                match self {
                    $(Self::$Variant => $crate::FeatureSet::$feature,)*
                }
            }

            /// The wire-encoding key.
            pub const fn encoding(self) -> u32 {
                self as u32
            }

            /// Decode an opcode, reading the LEB128 sub-opcode of the
            /// prefixed spaces.
            pub fn read<R: $crate::ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
                let byte = reader.read_u8()?;
                let key = match byte {
                    $crate::PREFIX_MISC | $crate::PREFIX_SIMD | $crate::PREFIX_ATOMIC => {
                        let sub = reader.read_var_u32()?;
                        if sub > 0xffff {
                            return Err(reader.unknown_opcode(sub));
                        }
                        (byte as u32) << 16 | sub
                    }
                    _ => byte as u32,
                };
                Self::from_u32(key).ok_or_else(|| reader.unknown_opcode(key))
            }

            /// Encode the opcode, writing prefixed sub-opcodes as LEB128.
            pub fn write<W: $crate::ImmWriter>(self, writer: &mut W) {
                let key = self.encoding();
                if key > 0xff {
                    writer.write_u8((key >> 16) as u8);
                    writer.write_var_u32(key & 0xffff);
                } else {
                    writer.write_u8(key as u8);
                }
            }
        }

        impl core::fmt::Display for Opcode {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.name())
            }
        }

        /// A full operator: an opcode together with its decoded immediates.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Operator {
            $(
                #[doc = concat!("The `", $name, "` operator.")]
                $Variant($crate::imm::$Imm),
            )*
        }

        impl Operator {
            /// The operator's opcode.
            pub const fn opcode(&self) -> Opcode {
                match self {
                    $(Self::$Variant(_) => Opcode::$Variant,)*
                }
            }

            /// The operator's display name.
            pub const fn name(&self) -> &'static str {
                self.opcode().name()
            }

            /// Decode the immediates of an already-read opcode.
            pub fn decode_with<R: $crate::ImmReader>(
                opcode: Opcode,
                reader: &mut R,
            ) -> Result<Self, R::Error> {
                use $crate::imm::Imm as _;
                match opcode {
                    $(Opcode::$Variant => {
                        Ok(Self::$Variant($crate::imm::$Imm::decode(reader)?))
                    })*
                }
            }

            /// Decode one operator: opcode plus immediates.
            pub fn decode<R: $crate::ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
                let opcode = Opcode::read(reader)?;
                Self::decode_with(opcode, reader)
            }

            /// Encode the operator: opcode plus immediates.
            pub fn encode<W: $crate::ImmWriter>(&self, writer: &mut W) {
                use $crate::imm::Imm as _;
                match self {
                    $(Self::$Variant(imm) => {
                        Opcode::$Variant.write(writer);
                        imm.encode(writer);
                    })*
                }
            }
        }

        impl core::fmt::Display for Operator {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
