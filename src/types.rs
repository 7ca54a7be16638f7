//! Hash-consed structural types.
//!
//! A [`Type`] is a 32-bit handle into a [`TypeSet`]. Structurally equal
//! types always get the same handle, so type equality is handle equality.
//!
//! Every type carries a cached *logical size* (`lsize`): the number of
//! location slots a value of that type occupies in the memory model.
//!
//! ```text
//! basic, pointer, map, chan, slice, interface, func   lsize = 1
//! [N]E                                                lsize = 1 + N * lsize(E)
//! struct { f1 .. fk }, tuple                          lsize = 1 + sum(lsize(fi))
//! ```
//!
//! Named types are resolved to their underlying type and never stored.

use log::debug;

use crate::error::{DecodeContext, DecodeError};
use crate::plain::{
    decode_hex32, decode_name, encode_hex32, encode_name, parse_usize, Plain, Reader, Tokens,
};
use crate::table::Table;
use crate::utils::{hash_str, pairing2, pairing3, pairing4, MyHash};

/// A handle to a type in a [`TypeSet`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Type(u32);

impl Type {
    pub const NO_TYPE: Type = Type(0);
    pub const BOOL: Type = Type(1);
    pub const INT: Type = Type(2);
    pub const INT8: Type = Type(3);
    pub const INT16: Type = Type(4);
    pub const INT32: Type = Type(5);
    pub const INT64: Type = Type(6);
    pub const UINT: Type = Type(7);
    pub const UINT8: Type = Type(8);
    pub const UINT16: Type = Type(9);
    pub const UINT32: Type = Type(10);
    pub const UINT64: Type = Type(11);
    pub const FLOAT32: Type = Type(12);
    pub const FLOAT64: Type = Type(13);
    pub const COMPLEX64: Type = Type(14);
    pub const COMPLEX128: Type = Type(15);
    pub const STRING: Type = Type(16);
    pub const UNSAFE_POINTER: Type = Type(17);
    pub const UINTPTR: Type = Type(18);

    /// Number of basic types; handles below this are basic.
    pub const NUM_BASIC: u32 = 19;

    pub const fn new(index: u32) -> Self {
        Type(index)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_basic(self) -> bool {
        self.0 < Self::NUM_BASIC
    }
}

impl Plain for Type {
    fn plain_encode(&self, out: &mut String) {
        encode_hex32(self.0, out);
    }

    fn plain_decode(token: &str) -> Result<Self, DecodeError> {
        decode_hex32(token).map(Type)
    }
}

const BASIC_NAMES: [&str; Type::NUM_BASIC as usize] = [
    "notype",
    "bool",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "float32",
    "float64",
    "complex64",
    "complex128",
    "string",
    "unsafe.Pointer",
    "uintptr",
];

/// Type constructor of a type node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Kind {
    Basic,
    Pointer,
    Array,
    Struct,
    Slice,
    Map,
    Chan,
    Interface,
    Func,
    Tuple,
}

impl Kind {
    pub const fn tag(self) -> char {
        match self {
            Kind::Basic => 'b',
            Kind::Pointer => 'p',
            Kind::Array => 'a',
            Kind::Struct => 's',
            Kind::Slice => 'l',
            Kind::Map => 'm',
            Kind::Chan => 'c',
            Kind::Interface => 'i',
            Kind::Func => 'f',
            Kind::Tuple => 't',
        }
    }

    pub fn from_tag(tag: &str) -> Option<Kind> {
        let kind = match tag {
            "b" => Kind::Basic,
            "p" => Kind::Pointer,
            "a" => Kind::Array,
            "s" => Kind::Struct,
            "l" => Kind::Slice,
            "m" => Kind::Map,
            "c" => Kind::Chan,
            "i" => Kind::Interface,
            "f" => Kind::Func,
            "t" => Kind::Tuple,
            _ => return None,
        };
        Some(kind)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Kind::Basic => "basic",
            Kind::Pointer => "pointer",
            Kind::Array => "array",
            Kind::Struct => "struct",
            Kind::Slice => "slice",
            Kind::Map => "map",
            Kind::Chan => "chan",
            Kind::Interface => "interface",
            Kind::Func => "func",
            Kind::Tuple => "tuple",
        }
    }
}

/// A struct field, tuple slot, interface method or signature parameter.
///
/// `offset` is the logical offset from the enclosing location: field `i` of
/// a struct at location `m` lives at `m + offset`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct Node {
    kind: Kind,
    /// Element type (pointer, slice, chan, array, map value).
    elem: Type,
    /// Map key, or function receiver.
    key: Type,
    lsize: u32,
    /// Struct fields, tuple slots, interface methods, or function parameters.
    fields: Vec<Field>,
    /// Function results.
    results: Vec<Field>,
    variadic: bool,
}

impl Node {
    fn basic() -> Self {
        Self::new(Kind::Basic)
    }

    fn new(kind: Kind) -> Self {
        Self {
            kind,
            elem: Type::NO_TYPE,
            key: Type::NO_TYPE,
            lsize: 1,
            fields: Vec::new(),
            results: Vec::new(),
            variadic: false,
        }
    }
}

fn hash_fields(mut h: u64, fields: &[Field]) -> u64 {
    for f in fields {
        h = pairing3(h, hash_str(&f.name), f.ty.0 as u64);
    }
    pairing2(h, fields.len() as u64)
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        let h = pairing4(
            self.kind as u64,
            self.elem.0 as u64,
            self.key.0 as u64,
            self.lsize as u64,
        );
        let h = hash_fields(h, &self.fields);
        let h = hash_fields(h, &self.results);
        pairing2(h, self.variadic as u64)
    }
}

/// Basic type names as seen by a translator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    Uintptr,
}

impl BasicKind {
    pub const fn ty(self) -> Type {
        Type(self as u32 + 1)
    }
}

/// A translator-side type description, converted with [`TypeSet::from_source_type`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SourceType {
    Basic(BasicKind),
    Pointer(Box<SourceType>),
    Array(usize, Box<SourceType>),
    Slice(Box<SourceType>),
    Map(Box<SourceType>, Box<SourceType>),
    Chan(Box<SourceType>),
    Struct(Vec<(String, SourceType)>),
    /// Method set: method names with their signatures.
    Interface(Vec<(String, SourceType)>),
    Func(Signature),
    Tuple(Vec<SourceType>),
    Named(String, Box<SourceType>),
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Signature {
    pub recv: Option<Box<SourceType>>,
    pub params: Vec<(String, SourceType)>,
    pub results: Vec<(String, SourceType)>,
    pub variadic: bool,
}

impl SourceType {
    pub fn pointer(elem: SourceType) -> Self {
        SourceType::Pointer(Box::new(elem))
    }
    pub fn array(len: usize, elem: SourceType) -> Self {
        SourceType::Array(len, Box::new(elem))
    }
    pub fn slice(elem: SourceType) -> Self {
        SourceType::Slice(Box::new(elem))
    }
    pub fn map(key: SourceType, elem: SourceType) -> Self {
        SourceType::Map(Box::new(key), Box::new(elem))
    }
    pub fn chan(elem: SourceType) -> Self {
        SourceType::Chan(Box::new(elem))
    }
    pub fn named(name: impl Into<String>, underlying: SourceType) -> Self {
        SourceType::Named(name.into(), Box::new(underlying))
    }
    pub fn structure<S: Into<String>>(fields: impl IntoIterator<Item = (S, SourceType)>) -> Self {
        SourceType::Struct(fields.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }
}

/// The set of interned types of one package.
#[derive(Debug, Clone)]
pub struct TypeSet {
    table: Table<Node>,
}

/// Bucket count of a default typeset.
const DEFAULT_BUCKETS: usize = 1 << 8;

impl Default for TypeSet {
    fn default() -> Self {
        TypeSet::new(DEFAULT_BUCKETS.trailing_zeros() as usize)
    }
}

impl TypeSet {
    /// Create a type set with `2^bucket_bits` initial buckets.
    pub fn new(bucket_bits: usize) -> Self {
        Self::from_table(Table::new(bucket_bits))
    }

    fn from_table(mut table: Table<Node>) -> Self {
        for _ in 0..Type::NUM_BASIC {
            table.push(Node::basic());
        }
        Self { table }
    }

    /// Number of types, basic ones included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn num_buckets(&self) -> usize {
        self.table.num_buckets()
    }

    fn node(&self, t: Type) -> &Node {
        assert!(t.index() < self.table.len(), "Unknown type handle {}", t.0);
        self.table.value(t.index())
    }

    fn intern(&mut self, node: Node) -> Type {
        let t = Type(self.table.put(node) as u32);
        debug!("intern: {} = {}", t.0, self.type_string(t));
        t
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn pointer_to(&mut self, elem: Type) -> Type {
        self.elem_node(Kind::Pointer, elem)
    }

    pub fn slice_of(&mut self, elem: Type) -> Type {
        self.elem_node(Kind::Slice, elem)
    }

    pub fn chan_of(&mut self, elem: Type) -> Type {
        self.elem_node(Kind::Chan, elem)
    }

    fn elem_node(&mut self, kind: Kind, elem: Type) -> Type {
        let mut node = Node::new(kind);
        node.elem = elem;
        self.intern(node)
    }

    pub fn array_of(&mut self, elem: Type, len: usize) -> Type {
        let total = (len as u64)
            .checked_mul(self.lsize(elem) as u64)
            .and_then(|n| n.checked_add(1))
            .filter(|&n| n <= u32::MAX as u64)
            .unwrap_or_else(|| panic!("array of {} elements is too large for the memory model", len));
        let mut node = Node::new(Kind::Array);
        node.elem = elem;
        node.lsize = total as u32;
        self.intern(node)
    }

    pub fn map_of(&mut self, key: Type, elem: Type) -> Type {
        let mut node = Node::new(Kind::Map);
        node.key = key;
        node.elem = elem;
        self.intern(node)
    }

    fn layout(&self, fields: Vec<(String, Type)>) -> (Vec<Field>, u32) {
        let mut offset = 1u32;
        let fields = fields
            .into_iter()
            .map(|(name, ty)| {
                let f = Field { name, ty, offset };
                offset = offset
                    .checked_add(self.lsize(ty))
                    .expect("struct is too large for the memory model");
                f
            })
            .collect();
        (fields, offset)
    }

    pub fn struct_of(&mut self, fields: Vec<(String, Type)>) -> Type {
        self.aggregate(Kind::Struct, fields)
    }

    pub fn tuple_of(&mut self, elems: Vec<Type>) -> Type {
        let fields = elems.into_iter().map(|t| (String::new(), t)).collect();
        self.aggregate(Kind::Tuple, fields)
    }

    fn aggregate(&mut self, kind: Kind, fields: Vec<(String, Type)>) -> Type {
        let (fields, lsize) = self.layout(fields);
        let mut node = Node::new(kind);
        node.fields = fields;
        node.lsize = lsize;
        self.intern(node)
    }

    pub fn interface_of(&mut self, methods: Vec<(String, Type)>) -> Type {
        let mut node = Node::new(Kind::Interface);
        node.fields = methods
            .into_iter()
            .map(|(name, ty)| Field { name, ty, offset: 0 })
            .collect();
        self.intern(node)
    }

    pub fn func_of(
        &mut self,
        recv: Option<Type>,
        params: Vec<(String, Type)>,
        results: Vec<(String, Type)>,
        variadic: bool,
    ) -> Type {
        let mut node = Node::new(Kind::Func);
        node.key = recv.unwrap_or(Type::NO_TYPE);
        node.fields = self.layout(params).0;
        node.results = self.layout(results).0;
        node.variadic = variadic;
        self.intern(node)
    }

    /// Intern a translator type description.
    pub fn from_source_type(&mut self, t: &SourceType) -> Type {
        match t {
            SourceType::Basic(b) => b.ty(),
            SourceType::Pointer(e) => {
                let e = self.from_source_type(e);
                self.pointer_to(e)
            }
            SourceType::Array(n, e) => {
                let e = self.from_source_type(e);
                self.array_of(e, *n)
            }
            SourceType::Slice(e) => {
                let e = self.from_source_type(e);
                self.slice_of(e)
            }
            SourceType::Chan(e) => {
                let e = self.from_source_type(e);
                self.chan_of(e)
            }
            SourceType::Map(k, v) => {
                let k = self.from_source_type(k);
                let v = self.from_source_type(v);
                self.map_of(k, v)
            }
            SourceType::Struct(fields) => {
                let fields = self.named_list(fields);
                self.struct_of(fields)
            }
            SourceType::Interface(methods) => {
                let methods = self.named_list(methods);
                self.interface_of(methods)
            }
            SourceType::Tuple(elems) => {
                let elems = elems.iter().map(|e| self.from_source_type(e)).collect();
                self.tuple_of(elems)
            }
            SourceType::Func(sig) => {
                let recv = sig.recv.as_ref().map(|r| self.from_source_type(r));
                let params = self.named_list(&sig.params);
                let results = self.named_list(&sig.results);
                self.func_of(recv, params, results, sig.variadic)
            }
            SourceType::Named(_, underlying) => self.from_source_type(underlying),
        }
    }

    fn named_list(&mut self, list: &[(String, SourceType)]) -> Vec<(String, Type)> {
        list.iter()
            .map(|(name, t)| (name.clone(), self.from_source_type(t)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn kind(&self, t: Type) -> Kind {
        self.node(t).kind
    }

    pub fn lsize(&self, t: Type) -> u32 {
        self.node(t).lsize
    }

    pub fn equal(&self, a: Type, b: Type) -> bool {
        a == b
    }

    pub fn elem(&self, t: Type) -> Type {
        let node = self.node(t);
        assert!(
            matches!(
                node.kind,
                Kind::Pointer | Kind::Slice | Kind::Chan | Kind::Array | Kind::Map
            ),
            "elem of {:?} type",
            node.kind
        );
        node.elem
    }

    pub fn key(&self, t: Type) -> Type {
        let node = self.node(t);
        assert_eq!(node.kind, Kind::Map, "key of non-map type");
        node.key
    }

    pub fn recv(&self, t: Type) -> Option<Type> {
        let node = self.node(t);
        assert_eq!(node.kind, Kind::Func, "recv of non-func type");
        (node.key != Type::NO_TYPE).then_some(node.key)
    }

    pub fn array_len(&self, t: Type) -> usize {
        let node = self.node(t);
        assert_eq!(node.kind, Kind::Array, "array_len of non-array type");
        ((node.lsize - 1) / self.lsize(node.elem)) as usize
    }

    pub fn fields(&self, t: Type) -> &[Field] {
        let node = self.node(t);
        assert!(
            matches!(node.kind, Kind::Struct | Kind::Tuple | Kind::Interface),
            "fields of {:?} type",
            node.kind
        );
        &node.fields
    }

    pub fn num_fields(&self, t: Type) -> usize {
        self.fields(t).len()
    }

    pub fn field(&self, t: Type, i: usize) -> &Field {
        let fields = self.fields(t);
        assert!(i < fields.len(), "field {} of type with {} fields", i, fields.len());
        &fields[i]
    }

    fn func(&self, t: Type) -> &Node {
        let node = self.node(t);
        assert_eq!(node.kind, Kind::Func, "signature of non-func type");
        node
    }

    pub fn params(&self, t: Type) -> &[Field] {
        &self.func(t).fields
    }
    pub fn num_params(&self, t: Type) -> usize {
        self.params(t).len()
    }
    pub fn param(&self, t: Type, i: usize) -> &Field {
        &self.params(t)[i]
    }

    pub fn results(&self, t: Type) -> &[Field] {
        &self.func(t).results
    }
    pub fn num_results(&self, t: Type) -> usize {
        self.results(t).len()
    }
    pub fn result(&self, t: Type, i: usize) -> &Field {
        &self.results(t)[i]
    }

    pub fn variadic(&self, t: Type) -> bool {
        self.func(t).variadic
    }

    /// Render a type the way a Go programmer would write it.
    pub fn type_string(&self, t: Type) -> String {
        let mut s = String::new();
        self.write_type(t, &mut s);
        s
    }

    fn write_type(&self, t: Type, s: &mut String) {
        if t.is_basic() {
            s.push_str(BASIC_NAMES[t.index()]);
            return;
        }
        let node = self.node(t);
        match node.kind {
            Kind::Basic => unreachable!("basic kind above the basic range"),
            Kind::Pointer => {
                s.push('*');
                self.write_type(node.elem, s);
            }
            Kind::Slice => {
                s.push_str("[]");
                self.write_type(node.elem, s);
            }
            Kind::Chan => {
                s.push_str("chan ");
                self.write_type(node.elem, s);
            }
            Kind::Array => {
                s.push_str(&format!("[{}]", self.array_len(t)));
                self.write_type(node.elem, s);
            }
            Kind::Map => {
                s.push_str("map[");
                self.write_type(node.key, s);
                s.push(']');
                self.write_type(node.elem, s);
            }
            Kind::Struct | Kind::Interface => {
                s.push_str(if node.kind == Kind::Struct { "struct{" } else { "interface{" });
                self.write_fields(&node.fields, "; ", s);
                s.push('}');
            }
            Kind::Tuple => {
                s.push('(');
                self.write_fields(&node.fields, ", ", s);
                s.push(')');
            }
            Kind::Func => {
                s.push_str("func(");
                self.write_fields(&node.fields, ", ", s);
                if node.variadic {
                    s.push_str("...");
                }
                s.push(')');
                if !node.results.is_empty() {
                    s.push_str(" (");
                    self.write_fields(&node.results, ", ", s);
                    s.push(')');
                }
            }
        }
    }

    fn write_fields(&self, fields: &[Field], sep: &str, s: &mut String) {
        for (i, f) in fields.iter().enumerate() {
            if i > 0 {
                s.push_str(sep);
            }
            if !f.name.is_empty() {
                s.push_str(&f.name);
                s.push(' ');
            }
            self.write_type(f.ty, s);
        }
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Re-intern every type of `other` into this set.
    ///
    /// Returns the handle mapping indexed by `other`'s handles. Components
    /// always precede the types built from them, so one forward pass suffices.
    pub fn import(&mut self, other: &TypeSet) -> Vec<Type> {
        let mut map: Vec<Type> = (0..Type::NUM_BASIC).map(Type).collect();
        for (i, node) in other.table.iter().skip(Type::NUM_BASIC as usize) {
            let remap = |t: Type| {
                assert!(t.index() < i, "type {} refers forward to {}", i, t.0);
                map[t.index()]
            };
            let mut copy = node.clone();
            copy.elem = remap(node.elem);
            copy.key = remap(node.key);
            for f in copy.fields.iter_mut().chain(copy.results.iter_mut()) {
                f.ty = remap(f.ty);
            }
            map.push(self.intern(copy));
        }
        map
    }

    /// Re-intern a single type of `other`, with its components.
    pub fn import_type(&mut self, other: &TypeSet, t: Type) -> Type {
        if t.is_basic() {
            return t;
        }
        let node = other.node(t);
        let mut copy = node.clone();
        copy.elem = self.import_type(other, node.elem);
        copy.key = self.import_type(other, node.key);
        for f in copy.fields.iter_mut().chain(copy.results.iter_mut()) {
            f.ty = self.import_type(other, f.ty);
        }
        self.intern(copy)
    }

    pub fn is_basic(&self, t: Type) -> bool {
        t.is_basic()
    }

    // ------------------------------------------------------------------
    // Plain encoding
    // ------------------------------------------------------------------

    pub fn encode(&self, out: &mut String) {
        out.push_str(&format!("{}:{}\n", self.len(), self.num_buckets()));
        for (_, node) in self.table.iter().skip(Type::NUM_BASIC as usize) {
            out.push(node.kind.tag());
            match node.kind {
                Kind::Basic => unreachable!("basic kind above the basic range"),
                Kind::Pointer | Kind::Slice | Kind::Chan => {
                    out.push(' ');
                    node.elem.plain_encode(out);
                }
                Kind::Array => {
                    out.push(' ');
                    node.elem.plain_encode(out);
                    let len = (node.lsize - 1) / self.lsize(node.elem);
                    out.push_str(&format!(" {}", len));
                }
                Kind::Map => {
                    out.push(' ');
                    node.key.plain_encode(out);
                    out.push(' ');
                    node.elem.plain_encode(out);
                }
                Kind::Struct | Kind::Tuple | Kind::Interface => {
                    encode_fields(&node.fields, out);
                }
                Kind::Func => {
                    out.push(' ');
                    node.key.plain_encode(out);
                    out.push_str(if node.variadic { " +" } else { " -" });
                    encode_fields(&node.fields, out);
                    encode_fields(&node.results, out);
                }
            }
            out.push('\n');
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<TypeSet, DecodeError> {
        let header = r.next_line("typeset header")?;
        let (count, buckets) = header
            .split_once(':')
            .ok_or_else(|| DecodeError::Invalid(format!("typeset header {:?}", header)))?;
        let count = parse_usize(count).with_context(|| "typeset count")?;
        let buckets = parse_usize(buckets).with_context(|| "typeset buckets")?;
        let bad_buckets = || DecodeError::Invalid(format!("bucket count {} is not a power of two up to 2^31", buckets));
        if !buckets.is_power_of_two() || buckets.trailing_zeros() as usize > Table::<Node>::MAX_BITS {
            return Err(bad_buckets());
        }
        // The table grows on demand, so preallocate no more than the input can fill.
        let alloc = buckets.min(DEFAULT_BUCKETS.max(r.capacity_for(buckets).next_power_of_two()));
        let table = Table::with_buckets(alloc).ok_or_else(bad_buckets)?;
        let mut ts = TypeSet::from_table(table);
        for k in Type::NUM_BASIC as usize..count {
            let line = r.next_line("type node").with_context(|| format!("typeset decode node {}", k))?;
            ts.decode_node(k, line)
                .with_context(|| format!("typeset decode node {}", k))?;
        }
        Ok(ts)
    }

    fn decode_node(&mut self, k: usize, line: &str) -> Result<(), DecodeError> {
        let mut toks = Tokens::new(line);
        let tag = toks.next("kind")?;
        let kind = Kind::from_tag(tag).ok_or_else(|| DecodeError::UnknownTag(tag.to_string()))?;
        let component = |toks: &mut Tokens<'_>, what| decode_component(toks, what, k);
        let t = match kind {
            Kind::Basic => return Err(DecodeError::UnknownTag(tag.to_string())),
            Kind::Pointer => {
                let e = component(&mut toks, "elem")?;
                self.pointer_to(e)
            }
            Kind::Slice => {
                let e = component(&mut toks, "elem")?;
                self.slice_of(e)
            }
            Kind::Chan => {
                let e = component(&mut toks, "elem")?;
                self.chan_of(e)
            }
            Kind::Array => {
                let e = component(&mut toks, "elem")?;
                let n = toks.usize("len")?;
                self.array_of(e, n)
            }
            Kind::Map => {
                let key = component(&mut toks, "key")?;
                let e = component(&mut toks, "elem")?;
                self.map_of(key, e)
            }
            Kind::Struct | Kind::Tuple | Kind::Interface => {
                let fields = decode_fields(&mut toks, k)?;
                match kind {
                    Kind::Struct => self.struct_of(fields),
                    Kind::Tuple => self.aggregate(Kind::Tuple, fields),
                    _ => self.interface_of(fields),
                }
            }
            Kind::Func => {
                let recv = component(&mut toks, "recv")?;
                let variadic = match toks.next("variadic")? {
                    "+" => true,
                    "-" => false,
                    other => return Err(DecodeError::UnknownTag(other.to_string())),
                };
                let params = decode_fields(&mut toks, k)?;
                let results = decode_fields(&mut toks, k)?;
                let recv = (recv != Type::NO_TYPE).then_some(recv);
                self.func_of(recv, params, results, variadic)
            }
        };
        toks.finish()?;
        if t.index() != k {
            return Err(DecodeError::Invalid(format!("duplicate of type {}", t.0)));
        }
        Ok(())
    }
}

fn encode_fields(fields: &[Field], out: &mut String) {
    out.push_str(&format!(" {}", fields.len()));
    for f in fields {
        out.push(' ');
        encode_name(&f.name, out);
        out.push(' ');
        f.ty.plain_encode(out);
    }
}

/// Decode a component handle of type `k`; components must be defined earlier.
fn decode_component(toks: &mut Tokens<'_>, what: &'static str, k: usize) -> Result<Type, DecodeError> {
    let t: Type = toks.decode(what)?;
    if t.index() >= k {
        return Err(DecodeError::Invalid(format!("{} {} is not defined yet", what, t.0)));
    }
    Ok(t)
}

fn decode_fields(toks: &mut Tokens<'_>, k: usize) -> Result<Vec<(String, Type)>, DecodeError> {
    let n = toks.usize("field count")?;
    let mut fields = Vec::with_capacity(toks.capacity_for(n));
    for _ in 0..n {
        let name = decode_name(toks.next("field name")?)?;
        let ty = decode_component(toks, "field type", k)?;
        fields.push((name, ty));
    }
    Ok(fields)
}
