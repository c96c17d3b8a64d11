binary_op!(
    MatMul,
    "matmul",
    math,
    a,
    b,
    dy,
    math.mat_mul(a, b)?,
    math.mat_mul(dy, &math.transpose(b, None)?)?,
    math.mat_mul(&math.transpose(a, None)?, dy)?
);
