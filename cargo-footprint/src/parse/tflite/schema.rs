//! Accessors for the subset of the TFLite flatbuffer schema the estimator
//! reads: model, subgraph, tensor, buffer, operator code, operator, and the
//! depthwise convolution options. Field slots follow `schema.fbs` (v3), laid
//! out the way `flatc --rust` emits table accessors.
//!
//! All accessors assume the buffer went through [`root_as_model`], which runs
//! the flatbuffers verifier over every table reachable from the root.

use flatbuffers::{
    Follow, ForwardsUOffset, InvalidFlatbuffer, Table, VOffsetT, Vector, Verifiable, Verifier,
};

pub const FILE_IDENTIFIER: &str = "TFL3";

/// `BuiltinOptions` union tag of `DepthwiseConv2DOptions`.
pub const BUILTIN_OPTIONS_DEPTHWISE_CONV_2D: u8 = 2;

macro_rules! table {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone)]
        pub struct $name<'a> {
            _tab: Table<'a>,
        }

        impl<'a> Follow<'a> for $name<'a> {
            type Inner = $name<'a>;

            #[inline]
            unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
                Self {
                    _tab: Table::new(buf, loc),
                }
            }
        }
    };
}

/// Parse and verify a TFLite model buffer.
pub fn root_as_model(buf: &[u8]) -> Result<Model<'_>, InvalidFlatbuffer> {
    flatbuffers::root::<Model>(buf)
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

table!(Model);

impl<'a> Model<'a> {
    pub const VT_VERSION: VOffsetT = 4;
    pub const VT_OPERATOR_CODES: VOffsetT = 6;
    pub const VT_SUBGRAPHS: VOffsetT = 8;
    pub const VT_DESCRIPTION: VOffsetT = 10;
    pub const VT_BUFFERS: VOffsetT = 12;

    pub fn version(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_VERSION, Some(0)) }.unwrap_or(0)
    }

    pub fn operator_codes(&self) -> Option<Vector<'a, ForwardsUOffset<OperatorCode<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<OperatorCode>>>>(
                    Self::VT_OPERATOR_CODES,
                    None,
                )
        }
    }

    pub fn subgraphs(&self) -> Option<Vector<'a, ForwardsUOffset<SubGraph<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<SubGraph>>>>(
                    Self::VT_SUBGRAPHS,
                    None,
                )
        }
    }

    pub fn description(&self) -> Option<&'a str> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<&str>>(Self::VT_DESCRIPTION, None)
        }
    }

    pub fn buffers(&self) -> Option<Vector<'a, ForwardsUOffset<Buffer<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<Buffer>>>>(Self::VT_BUFFERS, None)
        }
    }
}

impl Verifiable for Model<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("version", Self::VT_VERSION, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<OperatorCode>>>>(
                "operator_codes",
                Self::VT_OPERATOR_CODES,
                false,
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<SubGraph>>>>(
                "subgraphs",
                Self::VT_SUBGRAPHS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("description", Self::VT_DESCRIPTION, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<Buffer>>>>(
                "buffers",
                Self::VT_BUFFERS,
                false,
            )?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SubGraph
// ---------------------------------------------------------------------------

table!(SubGraph);

impl<'a> SubGraph<'a> {
    pub const VT_TENSORS: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;
    pub const VT_OPERATORS: VOffsetT = 10;
    pub const VT_NAME: VOffsetT = 12;

    pub fn tensors(&self) -> Option<Vector<'a, ForwardsUOffset<Tensor<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<Tensor>>>>(Self::VT_TENSORS, None)
        }
    }

    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None)
        }
    }

    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None)
        }
    }

    pub fn operators(&self) -> Option<Vector<'a, ForwardsUOffset<Operator<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<Operator>>>>(
                    Self::VT_OPERATORS,
                    None,
                )
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }
}

impl Verifiable for SubGraph<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<Tensor>>>>(
                "tensors",
                Self::VT_TENSORS,
                false,
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<Operator>>>>(
                "operators",
                Self::VT_OPERATORS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tensor
// ---------------------------------------------------------------------------

table!(Tensor);

impl<'a> Tensor<'a> {
    pub const VT_SHAPE: VOffsetT = 4;
    pub const VT_TYPE: VOffsetT = 6;
    pub const VT_BUFFER: VOffsetT = 8;
    pub const VT_NAME: VOffsetT = 10;

    pub fn shape(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_SHAPE, None)
        }
    }

    /// Raw `TensorType` code (FLOAT32 = 0 when absent).
    pub fn type_(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_TYPE, Some(0)) }.unwrap_or(0)
    }

    pub fn buffer(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_BUFFER, Some(0)) }.unwrap_or(0)
    }

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }
}

impl Verifiable for Tensor<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("shape", Self::VT_SHAPE, false)?
            .visit_field::<i8>("type", Self::VT_TYPE, false)?
            .visit_field::<u32>("buffer", Self::VT_BUFFER, false)?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

table!(Buffer);

impl<'a> Buffer<'a> {
    pub const VT_DATA: VOffsetT = 4;
    pub const VT_OFFSET: VOffsetT = 6;
    pub const VT_SIZE: VOffsetT = 8;

    pub fn data(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_DATA, None)
        }
    }

    /// Absolute file offset of out-of-line data (models over 2GB).
    /// Values 0 and 1 mean "not set".
    pub fn offset(&self) -> u64 {
        unsafe { self._tab.get::<u64>(Self::VT_OFFSET, Some(0)) }.unwrap_or(0)
    }

    pub fn size(&self) -> u64 {
        unsafe { self._tab.get::<u64>(Self::VT_SIZE, Some(0)) }.unwrap_or(0)
    }
}

impl Verifiable for Buffer<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>("data", Self::VT_DATA, false)?
            .visit_field::<u64>("offset", Self::VT_OFFSET, false)?
            .visit_field::<u64>("size", Self::VT_SIZE, false)?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OperatorCode
// ---------------------------------------------------------------------------

table!(OperatorCode);

impl<'a> OperatorCode<'a> {
    pub const VT_DEPRECATED_BUILTIN_CODE: VOffsetT = 4;
    pub const VT_CUSTOM_CODE: VOffsetT = 6;
    pub const VT_VERSION: VOffsetT = 8;
    pub const VT_BUILTIN_CODE: VOffsetT = 10;

    pub fn deprecated_builtin_code(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_DEPRECATED_BUILTIN_CODE, Some(0)) }.unwrap_or(0)
    }

    pub fn custom_code(&self) -> Option<&'a str> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<&str>>(Self::VT_CUSTOM_CODE, None)
        }
    }

    pub fn version(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_VERSION, Some(1)) }.unwrap_or(1)
    }

    pub fn builtin_code(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_BUILTIN_CODE, Some(0)) }.unwrap_or(0)
    }

    /// Builtin code accounting for pre-2.4 files, which only fill the
    /// deprecated byte-sized field.
    pub fn effective_builtin_code(&self) -> i32 {
        self.builtin_code()
            .max(i32::from(self.deprecated_builtin_code()))
    }
}

impl Verifiable for OperatorCode<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>(
                "deprecated_builtin_code",
                Self::VT_DEPRECATED_BUILTIN_CODE,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("custom_code", Self::VT_CUSTOM_CODE, false)?
            .visit_field::<i32>("version", Self::VT_VERSION, false)?
            .visit_field::<i32>("builtin_code", Self::VT_BUILTIN_CODE, false)?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

table!(Operator);

impl<'a> Operator<'a> {
    pub const VT_OPCODE_INDEX: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;
    pub const VT_BUILTIN_OPTIONS_TYPE: VOffsetT = 10;
    pub const VT_BUILTIN_OPTIONS: VOffsetT = 12;

    pub fn opcode_index(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_OPCODE_INDEX, Some(0)) }.unwrap_or(0)
    }

    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None)
        }
    }

    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None)
        }
    }

    pub fn builtin_options_type(&self) -> u8 {
        unsafe { self._tab.get::<u8>(Self::VT_BUILTIN_OPTIONS_TYPE, Some(0)) }.unwrap_or(0)
    }

    pub fn builtin_options_as_depthwise_conv_2d_options(
        &self,
    ) -> Option<DepthwiseConv2DOptions<'a>> {
        if self.builtin_options_type() != BUILTIN_OPTIONS_DEPTHWISE_CONV_2D {
            return None;
        }
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Table<'a>>>(Self::VT_BUILTIN_OPTIONS, None)
                .map(|table| DepthwiseConv2DOptions { _tab: table })
        }
    }
}

impl Verifiable for Operator<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("opcode_index", Self::VT_OPCODE_INDEX, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .visit_union::<u8, _>(
                "builtin_options_type",
                Self::VT_BUILTIN_OPTIONS_TYPE,
                "builtin_options",
                Self::VT_BUILTIN_OPTIONS,
                false,
                |key, v, pos| match key {
                    BUILTIN_OPTIONS_DEPTHWISE_CONV_2D => v
                        .verify_union_variant::<ForwardsUOffset<DepthwiseConv2DOptions>>(
                            "BuiltinOptions::DepthwiseConv2DOptions",
                            pos,
                        ),
                    // Options the estimator never reads are left unverified
                    // and never dereferenced.
                    _ => Ok(()),
                },
            )?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DepthwiseConv2DOptions
// ---------------------------------------------------------------------------

table!(DepthwiseConv2DOptions);

impl<'a> DepthwiseConv2DOptions<'a> {
    pub const VT_PADDING: VOffsetT = 4;
    pub const VT_STRIDE_W: VOffsetT = 6;
    pub const VT_STRIDE_H: VOffsetT = 8;
    pub const VT_DEPTH_MULTIPLIER: VOffsetT = 10;

    pub fn stride_w(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_W, Some(0)) }.unwrap_or(0)
    }

    pub fn stride_h(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_H, Some(0)) }.unwrap_or(0)
    }

    pub fn depth_multiplier(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_DEPTH_MULTIPLIER, Some(0)) }.unwrap_or(0)
    }
}

impl Verifiable for DepthwiseConv2DOptions<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>("padding", Self::VT_PADDING, false)?
            .visit_field::<i32>("stride_w", Self::VT_STRIDE_W, false)?
            .visit_field::<i32>("stride_h", Self::VT_STRIDE_H, false)?
            .visit_field::<i32>("depth_multiplier", Self::VT_DEPTH_MULTIPLIER, false)?
            .finish();
        Ok(())
    }
}
