use gradgraph_array::NdArray;

binary_op!(
    Add,
    "add",
    math,
    a,
    b,
    dy,
    math.add(a, b)?,
    math.clone_array(dy),
    math.clone_array(dy)
);

binary_op!(
    Subtract,
    "subtract",
    math,
    a,
    b,
    dy,
    math.sub(a, b)?,
    math.clone_array(dy),
    math.scalar_times_array(&NdArray::scalar(-1.0), dy)?
);

binary_op!(
    Multiply,
    "multiply",
    math,
    a,
    b,
    dy,
    math.elementwise_mul(a, b)?,
    math.elementwise_mul(dy, b)?,
    math.elementwise_mul(dy, a)?
);
